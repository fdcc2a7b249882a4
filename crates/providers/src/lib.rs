//! Provider abstractions for chat-completion LLM backends.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by backend")]
    RateLimited,
    #[error("backend rejected credentials")]
    Unauthorized,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// A chat-completion backend addressed by model identifier.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a single user prompt to `model` and returns the raw text of the first choice.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;

    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.llms.is_empty()
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl LlmProvider for Echo {
        async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
            Ok(format!("{model}:{prompt}"))
        }

        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(vec!["echo".into()])
        }
    }

    #[tokio::test]
    async fn preferred_provider_is_used_when_no_name_given() {
        let reg = ProviderRegistry::new()
            .with_llm("echo", Arc::new(Echo))
            .set_preferred_llm("echo");
        let llm = reg.llm(None).unwrap();
        assert_eq!(llm.complete("m", "hi").await.unwrap(), "m:hi");
    }

    #[test]
    fn empty_registry_reports_unknown_provider() {
        let reg = ProviderRegistry::new();
        assert!(reg.is_empty());
        assert!(matches!(
            reg.llm(None),
            Err(ProviderError::UnknownProvider(_))
        ));
        assert!(matches!(
            reg.llm(Some("groq")),
            Err(ProviderError::UnknownProvider(name)) if name == "groq"
        ));
    }
}
