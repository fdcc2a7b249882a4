//! Classification orchestrator: validate, match locally, call the model chain, resolve.

use crate::config::{AppConfig, MatcherConfig};
use crate::error::ClassifyError;
use crate::fallback::{first_success, Exhausted};
use crate::index::TariffIndex;
use crate::matcher::{self, LocalMatch};
use crate::models::{
    truncate_chars, ClarificationRequest, ClassificationOutcome, ClassificationQuery,
    OutcomeSource, Resolution, MAX_DESCRIPTION_CHARS,
};
use crate::prompt::{self, PromptOptions};
use crate::validator::{self, ModelVerdict, DEFAULT_CLARIFICATION_MESSAGE};
use providers::{LlmProvider, ProviderError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Asked when no model is available to tailor questions.
pub const GENERIC_QUESTIONS: [&str; 3] = [
    "What is the product made of (material or main ingredients)?",
    "What is the product's intended use or function?",
    "In what form or processing state is it supplied (raw, processed, packaged, assembled)?",
];

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub matcher: MatcherConfig,
    /// Primary model first, then backups.
    pub models: Vec<String>,
    pub clarification_check: bool,
    pub min_specificity: u8,
    pub clarify_below: u8,
    pub default_confidence: u8,
}

impl ClassifierSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            matcher: cfg.matcher.clone(),
            models: cfg.llm.model_chain(),
            clarification_check: cfg.llm.clarification_check,
            min_specificity: cfg.llm.min_specificity,
            clarify_below: cfg.classification.clarify_below,
            default_confidence: cfg.classification.default_confidence,
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Stateless across requests; safe to share behind an `Arc`.
pub struct Classifier {
    llm: Option<Arc<dyn LlmProvider>>,
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, settings: ClassifierSettings) -> Self {
        Self { llm, settings }
    }

    pub fn has_backend(&self) -> bool {
        self.backend().is_some()
    }

    pub fn primary_model(&self) -> Option<&str> {
        self.backend()
            .and_then(|_| self.settings.models.first())
            .map(String::as_str)
    }

    pub fn backend(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.llm
            .as_ref()
            .filter(|_| !self.settings.models.is_empty())
    }

    pub async fn classify(
        &self,
        index: Option<&TariffIndex>,
        query: &ClassificationQuery,
    ) -> Result<ClassificationOutcome, ClassifyError> {
        let description = query.description.trim();
        if description.is_empty() {
            return Err(ClassifyError::InvalidInput(
                "Product description is required".to_string(),
            ));
        }
        let index = match index {
            Some(index) if !index.is_empty() => index,
            _ => {
                return Err(ClassifyError::ServiceUnavailable(
                    "Tariff data is not loaded yet".to_string(),
                ))
            }
        };

        let local = if self.settings.matcher.enabled {
            matcher::best_match(description, index.records(), self.settings.matcher.min_score)
        } else {
            None
        };
        if let Some(m) = local
            .as_ref()
            .filter(|m| m.is_confident(self.settings.matcher.accept_confidence))
        {
            info!(
                code = %m.best.record.code,
                confidence = m.confidence,
                "confident local match, skipping model"
            );
            return Ok(ClassificationOutcome {
                resolution: Resolution::Classified(m.to_result(description)),
                source: OutcomeSource::Lexical,
            });
        }

        let Some(llm) = self.backend() else {
            return self.resolve_without_backend(description, query.is_follow_up, local.as_ref());
        };

        if self.settings.clarification_check && !query.is_follow_up {
            if let Some((model, request)) = self.check_vagueness(llm, description).await {
                return Ok(ClassificationOutcome {
                    resolution: Resolution::NeedsClarification(request),
                    source: OutcomeSource::Model(model),
                });
            }
        }

        let prompt = prompt::classification_prompt(
            description,
            index.context(),
            PromptOptions {
                clarify_below: self.settings.clarify_below,
                is_follow_up: query.is_follow_up,
            },
        );
        let (model, raw) = self.invoke(llm, &prompt).await?;

        let verdict = validator::validate(&raw, self.settings.default_confidence).map_err(|e| {
            warn!(model = %model, error = %e, "model output failed validation");
            ClassifyError::from(e)
        })?;

        let resolution = match verdict {
            ModelVerdict::Classification(mut result) => {
                if result.description.is_empty() {
                    let fill = index
                        .lookup(&result.hs_code)
                        .map(|r| r.description.as_str())
                        .unwrap_or(description);
                    result.description = truncate_chars(fill, MAX_DESCRIPTION_CHARS);
                }
                if !query.is_follow_up && result.confidence < self.settings.clarify_below {
                    info!(
                        model = %model,
                        code = %result.hs_code,
                        confidence = result.confidence,
                        "low-confidence answer, asking for clarification"
                    );
                    Resolution::NeedsClarification(ClarificationRequest {
                        message: format!(
                            "The closest tariff entry is {} ({}), but confidence is low. \
                             Please add detail to confirm.",
                            result.hs_code,
                            truncate_chars(&result.description, 80)
                        ),
                        clarification_questions: generic_questions(),
                        confidence: Some(result.confidence),
                    })
                } else {
                    info!(model = %model, code = %result.hs_code, confidence = result.confidence, "classified");
                    Resolution::Classified(result)
                }
            }
            ModelVerdict::Clarification(request) => {
                info!(
                    model = %model,
                    questions = request.clarification_questions.len(),
                    "model asked for clarification"
                );
                Resolution::NeedsClarification(request)
            }
        };
        Ok(ClassificationOutcome {
            resolution,
            source: OutcomeSource::Model(model),
        })
    }

    /// Runs `prompt` down the model chain; returns the answering model and its raw text.
    async fn invoke(
        &self,
        llm: &Arc<dyn LlmProvider>,
        prompt: &str,
    ) -> Result<(String, String), ClassifyError> {
        first_success(
            self.settings.models.iter().cloned(),
            |model| {
                let llm = Arc::clone(llm);
                async move {
                    debug!(model = %model, "invoking model");
                    llm.complete(&model, prompt).await
                }
            },
            |e| matches!(e, ProviderError::Unauthorized),
        )
        .await
        .map_err(|exhausted| {
            for attempt in &exhausted.attempts {
                warn!(model = %attempt.candidate, error = %attempt.error, "model attempt failed");
            }
            exhausted_error(&exhausted)
        })
    }

    /// `None` means "go ahead and classify", including when the check itself fails.
    async fn check_vagueness(
        &self,
        llm: &Arc<dyn LlmProvider>,
        description: &str,
    ) -> Option<(String, ClarificationRequest)> {
        let prompt = prompt::clarification_check_prompt(description);
        let (model, raw) = match self.invoke(llm, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "clarification check failed, continuing");
                return None;
            }
        };
        let assessment = match validator::validate_vagueness(&raw) {
            Ok(a) => a,
            Err(e) => {
                warn!(model = %model, error = %e, "unreadable clarification check, continuing");
                return None;
            }
        };
        debug!(
            too_vague = assessment.is_too_vague,
            specificity = ?assessment.specificity_score,
            "clarification check"
        );
        if !assessment.needs_clarification(self.settings.min_specificity) {
            return None;
        }

        let message = match &assessment.product_type {
            Some(kind) => format!("Please provide more details about this {kind} so it can be classified accurately."),
            None => DEFAULT_CLARIFICATION_MESSAGE.to_string(),
        };
        let questions = if assessment.clarifications.is_empty() {
            generic_questions()
        } else {
            assessment.clarifications
        };
        Some((
            model,
            ClarificationRequest {
                message,
                clarification_questions: questions,
                confidence: None,
            },
        ))
    }

    fn resolve_without_backend(
        &self,
        description: &str,
        is_follow_up: bool,
        local: Option<&LocalMatch<'_>>,
    ) -> Result<ClassificationOutcome, ClassifyError> {
        match (local, is_follow_up) {
            (Some(m), true) => {
                info!(code = %m.best.record.code, "follow-up resolved by tentative local match");
                Ok(ClassificationOutcome {
                    resolution: Resolution::Classified(m.to_result(description)),
                    source: OutcomeSource::Lexical,
                })
            }
            (None, true) => Err(ClassifyError::ServiceUnavailable(
                "No classification backend is configured and no tariff entry matched".to_string(),
            )),
            (local, false) => {
                let message = match local {
                    Some(m) => format!(
                        "The closest tariff entry is {} ({}). Please add detail to confirm.",
                        m.best.record.code,
                        truncate_chars(&m.best.record.description, 80)
                    ),
                    None => DEFAULT_CLARIFICATION_MESSAGE.to_string(),
                };
                Ok(ClassificationOutcome {
                    resolution: Resolution::NeedsClarification(ClarificationRequest {
                        message,
                        clarification_questions: generic_questions(),
                        confidence: local.map(|m| m.confidence),
                    }),
                    source: OutcomeSource::Fallback,
                })
            }
        }
    }
}

fn generic_questions() -> Vec<String> {
    GENERIC_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

fn exhausted_error(exhausted: &Exhausted<String, ProviderError>) -> ClassifyError {
    let attempts = &exhausted.attempts;
    if exhausted.aborted
        && attempts
            .last()
            .is_some_and(|a| matches!(a.error, ProviderError::Unauthorized))
    {
        return ClassifyError::Unauthorized;
    }
    if !attempts.is_empty()
        && attempts
            .iter()
            .all(|a| matches!(a.error, ProviderError::RateLimited))
    {
        return ClassifyError::RateLimited;
    }
    ClassifyError::AllModelsFailed {
        attempts: attempts.len(),
    }
}
