use serde::{Deserialize, Serialize};

pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_REASONS: usize = 3;
pub const MAX_RELATED_CODES: usize = 2;
pub const MAX_CLARIFICATION_QUESTIONS: usize = 3;

/// One `code -> description` line of the tariff, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffRecord {
    pub code: String,
    pub description: String,
}

impl TariffRecord {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassificationQuery {
    pub description: String,
    pub is_follow_up: bool,
}

impl ClassificationQuery {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            is_follow_up: false,
        }
    }

    pub fn follow_up(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            is_follow_up: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCode {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub hs_code: String,
    pub description: String,
    pub confidence: u8,
    pub reasons: Vec<String>,
    pub related_codes: Vec<RelatedCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationRequest {
    pub message: String,
    pub clarification_questions: Vec<String>,
    /// Self-reported confidence that accompanied the request, if any.
    pub confidence: Option<u8>,
}

/// Where a resolved outcome came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeSource {
    Lexical,
    Model(String),
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Classified(ClassificationResult),
    NeedsClarification(ClarificationRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationOutcome {
    pub resolution: Resolution,
    pub source: OutcomeSource,
}

/// Wire shape of `POST /api/search-hs-code`. Every key is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub needs_clarification: bool,
    pub hs_code: Option<String>,
    pub description: Option<String>,
    pub confidence: u8,
    pub reasons: Vec<String>,
    pub related_codes: Vec<RelatedCode>,
    pub message: Option<String>,
    pub clarification_questions: Option<Vec<String>>,
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            needs_clarification: false,
            hs_code: None,
            description: None,
            confidence: 0,
            reasons: Vec::new(),
            related_codes: Vec::new(),
            message: None,
            clarification_questions: None,
            error: None,
        }
    }

    pub fn from_resolution(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Classified(r) => Self {
                hs_code: Some(r.hs_code.clone()),
                description: Some(r.description.clone()),
                confidence: r.confidence,
                reasons: r.reasons.clone(),
                related_codes: r.related_codes.clone(),
                ..Self::empty()
            },
            Resolution::NeedsClarification(c) => Self {
                needs_clarification: true,
                confidence: c.confidence.unwrap_or(0),
                message: Some(c.message.clone()),
                clarification_questions: Some(c.clarification_questions.clone()),
                ..Self::empty()
            },
        }
    }

    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty()
        }
    }
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_response_keeps_full_schema() {
        let value = serde_json::to_value(SearchResponse::from_error("Product description is required"))
            .unwrap();
        assert_eq!(
            value,
            json!({
                "needsClarification": false,
                "hsCode": null,
                "description": null,
                "confidence": 0,
                "reasons": [],
                "relatedCodes": [],
                "message": null,
                "clarificationQuestions": null,
                "error": "Product description is required"
            })
        );
    }

    #[test]
    fn clarification_maps_to_null_code() {
        let resp = SearchResponse::from_resolution(&Resolution::NeedsClarification(
            ClarificationRequest {
                message: "Need more detail".into(),
                clarification_questions: vec!["Q1?".into()],
                confidence: Some(40),
            },
        ));
        assert!(resp.needs_clarification);
        assert_eq!(resp.hs_code, None);
        assert_eq!(resp.confidence, 40);
        assert_eq!(resp.clarification_questions, Some(vec!["Q1?".to_string()]));
    }

    #[test]
    fn query_accepts_camel_case_follow_up_flag() {
        let q: ClassificationQuery =
            serde_json::from_value(json!({"description": "tea", "isFollowUp": true})).unwrap();
        assert!(q.is_follow_up);
        let q: ClassificationQuery = serde_json::from_value(json!({"description": "tea"})).unwrap();
        assert!(!q.is_follow_up);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("café au lait", 4), "café");
        assert_eq!(truncate_chars("tea", 10), "tea");
    }
}
