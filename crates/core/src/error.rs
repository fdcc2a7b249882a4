use crate::validator::ValidationError;
use thiserror::Error;

/// Caller-visible classification failures.
///
/// `Display` carries internal detail for logs; callers get [`ClassifyError::public_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("all {attempts} model attempt(s) failed")]
    AllModelsFailed { attempts: usize },
    #[error("malformed model output: {0}")]
    MalformedModelOutput(#[from] ValidationError),
    #[error("rate limited by model backend")]
    RateLimited,
    #[error("model backend rejected credentials")]
    Unauthorized,
}

impl ClassifyError {
    pub fn status_code(&self) -> u16 {
        match self {
            ClassifyError::InvalidInput(_) => 400,
            ClassifyError::Unauthorized => 401,
            ClassifyError::RateLimited => 429,
            ClassifyError::AllModelsFailed { .. } | ClassifyError::MalformedModelOutput(_) => 500,
            ClassifyError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ClassifyError::InvalidInput(_) => "invalid_input",
            ClassifyError::ServiceUnavailable(_) => "service_unavailable",
            ClassifyError::AllModelsFailed { .. } => "all_models_failed",
            ClassifyError::MalformedModelOutput(_) => "malformed_model_output",
            ClassifyError::RateLimited => "rate_limited",
            ClassifyError::Unauthorized => "unauthorized",
        }
    }

    /// Stable message safe to return to callers; never contains backend text.
    pub fn public_message(&self) -> String {
        match self {
            ClassifyError::InvalidInput(msg) => msg.clone(),
            ClassifyError::ServiceUnavailable(msg) => msg.clone(),
            ClassifyError::AllModelsFailed { .. } => {
                "Classification service failed to respond. Please try again.".to_string()
            }
            ClassifyError::MalformedModelOutput(_) => {
                "Classification service returned an unreadable response.".to_string()
            }
            ClassifyError::RateLimited => {
                "Too many requests to the classification service. Please retry shortly.".to_string()
            }
            ClassifyError::Unauthorized => {
                "Classification service credentials are missing or invalid.".to_string()
            }
        }
    }
}
