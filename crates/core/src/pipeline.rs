//! Startup wiring: tariff loading, artifact generation and backend registration.

use crate::classifier::{Classifier, ClassifierSettings};
use crate::config::{AppConfig, TariffConfig};
use crate::extractor;
use crate::index::TariffIndex;
use crate::models::TariffRecord;
use crate::validator::HS_CODE_DIGITS;
use anyhow::Context;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use storage::models::CodeEntry;
use storage::ArtifactPaths;
use tracing::{info, warn};

/// Loads the tariff index from the configured source.
///
/// A pre-extracted codes file wins over the tariff document. When extracting from
/// the document and `artifacts_dir` is set, the derived artifacts are written too.
pub fn load_index(cfg: &TariffConfig) -> anyhow::Result<TariffIndex> {
    if let Some(codes_path) = &cfg.codes_path {
        let path = Path::new(codes_path);
        let entries = storage::load_codes(path)
            .with_context(|| format!("load codes from {}", path.display()))?;
        let records = records_from_entries(entries);
        info!(path = %path.display(), records = records.len(), "loaded tariff codes");
        return Ok(TariffIndex::from_records(records, cfg));
    }

    let source = cfg
        .source
        .as_deref()
        .context("no tariff source configured (set tariff.source or tariff.codes_path)")?;
    let source = Path::new(source);
    let text = extractor::read_source(source)
        .with_context(|| format!("read tariff source {}", source.display()))?;
    let index = TariffIndex::from_text(&text, cfg);
    info!(
        path = %source.display(),
        records = index.records().len(),
        context_chars = index.context().len(),
        "extracted tariff records"
    );
    if index.records().is_empty() {
        warn!("no HS code lines recognised, prompts will use raw tariff text");
    }

    if let Some(dir) = &cfg.artifacts_dir {
        write_index_artifacts(&index, &text, Path::new(dir))?;
    }
    Ok(index)
}

/// Extracts `source` and writes the artifacts into `out_dir`.
pub fn extract_to_dir(
    source: &Path,
    out_dir: &Path,
    cfg: &TariffConfig,
) -> anyhow::Result<(TariffIndex, ArtifactPaths)> {
    let text = extractor::read_source(source)
        .with_context(|| format!("read tariff source {}", source.display()))?;
    let index = TariffIndex::from_text(&text, cfg);
    let paths = write_index_artifacts(&index, &text, out_dir)?;
    Ok((index, paths))
}

fn write_index_artifacts(
    index: &TariffIndex,
    raw_text: &str,
    dir: &Path,
) -> anyhow::Result<ArtifactPaths> {
    let entries: Vec<CodeEntry> = index.records().iter().map(entry_from_record).collect();
    let paths = storage::write_artifacts(dir, &entries, raw_text, index.loaded_at())
        .with_context(|| format!("write artifacts to {}", dir.display()))?;
    Ok(paths)
}

fn entry_from_record(record: &TariffRecord) -> CodeEntry {
    CodeEntry {
        code: record.code.clone(),
        description: record.description.clone(),
    }
}

/// Keeps entries whose code is exactly eight digits and whose description has text.
fn records_from_entries(entries: Vec<CodeEntry>) -> Vec<TariffRecord> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let code = entry.code.trim();
            let description = entry.description.trim();
            let well_formed = code.len() == HS_CODE_DIGITS
                && code.bytes().all(|b| b.is_ascii_digit())
                && !description.is_empty();
            if well_formed {
                Some(TariffRecord::new(code, description))
            } else {
                warn!(code = %entry.code, "skipping malformed code entry");
                None
            }
        })
        .collect()
}

/// Registers the OpenAI-compatible backend when its credential is present in the environment.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let reg = ProviderRegistry::new();
    let key = std::env::var(&config.llm.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());
    let Some(api_key) = key else {
        warn!(
            env = %config.llm.api_key_env,
            "no backend credential set, running with local matching only"
        );
        return reg;
    };

    match OpenAiProvider::new(OpenAiConfig {
        api_key,
        base_url: config.llm.base_url.clone(),
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
        timeout: Duration::from_secs(config.llm.timeout_secs),
    }) {
        Ok(provider) => {
            info!(provider = %config.llm.provider, base_url = %config.llm.base_url, "registered model backend");
            reg.with_llm(&config.llm.provider, Arc::new(provider))
                .set_preferred_llm(&config.llm.provider)
        }
        Err(e) => {
            warn!(error = %e, "could not build model backend client");
            reg
        }
    }
}

pub fn build_classifier(config: &AppConfig, registry: &ProviderRegistry) -> Classifier {
    let llm = if registry.is_empty() {
        None
    } else {
        match registry.llm(None) {
            Ok(llm) => Some(llm),
            Err(e) => {
                warn!(error = %e, "no preferred model backend");
                None
            }
        }
    };
    Classifier::new(llm, ClassifierSettings::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_codes_are_dropped_on_load() {
        let records = records_from_entries(vec![
            CodeEntry {
                code: "09024000".into(),
                description: " Black tea ".into(),
            },
            CodeEntry {
                code: "0902".into(),
                description: "Tea heading".into(),
            },
            CodeEntry {
                code: "0902400A".into(),
                description: "bad".into(),
            },
            CodeEntry {
                code: "09011100".into(),
                description: "   ".into(),
            },
            CodeEntry {
                code: "09012100".into(),
                description: String::new(),
            },
        ]);
        assert_eq!(records, vec![TariffRecord::new("09024000", "Black tea")]);
    }

    #[test]
    fn missing_source_is_an_error() {
        let err = load_index(&TariffConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no tariff source"));
    }

    #[test]
    fn codes_file_takes_precedence_over_document() {
        let dir = tempfile::tempdir().unwrap();
        let codes = dir.path().join("codes.json");
        std::fs::write(
            &codes,
            r#"{"codes":[{"code":"09011100","description":"Coffee, not roasted"}]}"#,
        )
        .unwrap();
        let cfg = TariffConfig {
            source: Some(dir.path().join("missing.pdf").display().to_string()),
            codes_path: Some(codes.display().to_string()),
            ..TariffConfig::default()
        };
        let index = load_index(&cfg).unwrap();
        assert_eq!(index.records().len(), 1);
        assert!(index.lookup("09011100").is_some());
    }

    #[test]
    fn document_load_writes_artifacts_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tariff.txt");
        std::fs::write(&source, "09024000 - Black tea\n12\n09011100 Coffee, not roasted\n").unwrap();
        let out = dir.path().join("out");
        let cfg = TariffConfig {
            source: Some(source.display().to_string()),
            artifacts_dir: Some(out.display().to_string()),
            ..TariffConfig::default()
        };
        let index = load_index(&cfg).unwrap();
        assert_eq!(index.records().len(), 2);
        let reloaded = storage::load_codes(&out.join(storage::CODES_JSON)).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(out.join(storage::RAW_TEXT).exists());
    }

    #[test]
    fn classifier_without_backend_is_local_only() {
        let config = AppConfig::default();
        let classifier = build_classifier(&config, &ProviderRegistry::new());
        assert!(!classifier.has_backend());
    }
}
