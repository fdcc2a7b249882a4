use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tariff: TariffConfig,
    pub matcher: MatcherConfig,
    pub llm: LlmConfig,
    pub classification: ClassificationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    /// Tariff document: plain text, or PDF when built with the `pdf` feature.
    pub source: Option<String>,
    /// Pre-extracted codes JSON; preferred over `source` when it exists.
    pub codes_path: Option<String>,
    /// Where `hs-codes.json`, `hs-codes.txt` and `tariff-raw.txt` are written after extraction.
    pub artifacts_dir: Option<String>,
    pub max_description_chars: usize,
    pub min_continuation_chars: usize,
    pub context_max_records: usize,
    pub context_max_chars: usize,
    pub raw_context_chars: usize,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            source: None,
            codes_path: None,
            artifacts_dir: None,
            max_description_chars: 500,
            min_continuation_chars: 3,
            context_max_records: 2000,
            context_max_chars: 50_000,
            raw_context_chars: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub enabled: bool,
    pub min_score: f64,
    pub accept_confidence: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: 5.0,
            accept_confidence: 70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub primary_model: String,
    pub backup_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub clarification_check: bool,
    pub min_specificity: u8,
    /// Environment variable holding the backend credential.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            primary_model: "llama-3.3-70b-versatile".to_string(),
            backup_models: vec![
                "llama-3.1-8b-instant".to_string(),
                "mixtral-8x7b-32768".to_string(),
            ],
            temperature: 0.1,
            max_tokens: 800,
            timeout_secs: 30,
            clarification_check: true,
            min_specificity: 4,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

impl LlmConfig {
    /// Primary model followed by backups, in attempt order.
    pub fn model_chain(&self) -> Vec<String> {
        std::iter::once(self.primary_model.clone())
            .chain(self.backup_models.iter().cloned())
            .filter(|m| !m.trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub clarify_below: u8,
    pub default_confidence: u8,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            clarify_below: 70,
            default_confidence: 75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Layers an optional TOML file under `HSCODE_*` environment variables
/// (`HSCODE_SERVER__PORT=8080`, `HSCODE_LLM__BACKUP_MODELS=a,b`).
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    load_with_env(path, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("HSCODE")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("llm.backup_models")
        .try_parsing(true)
}

fn load_with_env(path: Option<&str>, env: config::Environment) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.add_source(env).build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.matcher.accept_confidence, 70);
        assert_eq!(cfg.classification.default_confidence, 75);
        assert_eq!(cfg.tariff.max_description_chars, 500);
        assert_eq!(cfg.llm.model_chain()[0], "llama-3.3-70b-versatile");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hscode.toml");
        std::fs::write(
            &path,
            "[llm]\nprimary_model = \"m1\"\nbackup_models = [\"m2\", \"\"]\n\n[server]\nport = 8088\n",
        )
        .unwrap();
        let cfg = load(path.to_str()).unwrap();
        assert_eq!(cfg.server.port, 8088);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.llm.model_chain(), vec!["m1".to_string(), "m2".to_string()]);
    }

    #[test]
    fn environment_overrides_use_single_underscore_prefix() {
        let mut vars = config::Map::new();
        vars.insert("HSCODE_SERVER__PORT".to_string(), "8080".to_string());
        vars.insert(
            "HSCODE_LLM__BACKUP_MODELS".to_string(),
            "llama-3.1-8b-instant,gemma2-9b-it".to_string(),
        );
        vars.insert("HSCODE_MATCHER__ENABLED".to_string(), "false".to_string());
        let cfg = load_with_env(None, environment().source(Some(vars))).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert!(!cfg.matcher.enabled);
        assert_eq!(
            cfg.llm.backup_models,
            vec!["llama-3.1-8b-instant".to_string(), "gemma2-9b-it".to_string()]
        );
        assert_eq!(cfg.llm.primary_model, "llama-3.3-70b-versatile");
    }
}
