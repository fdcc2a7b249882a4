//! Turns free-form model text into a typed verdict.
//!
//! Model output is untrusted: every malformed shape resolves to a
//! [`ValidationError`], never a panic.

use crate::models::{
    truncate_chars, ClarificationRequest, ClassificationResult, RelatedCode,
    MAX_CLARIFICATION_QUESTIONS, MAX_DESCRIPTION_CHARS, MAX_REASONS, MAX_RELATED_CODES,
};
use serde_json::{Map, Value};
use thiserror::Error;

pub const HS_CODE_DIGITS: usize = 8;
pub const DEFAULT_CLARIFICATION_MESSAGE: &str =
    "More detail is needed to classify this product accurately.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("model returned no text")]
    EmptyOutput,
    #[error("no JSON object found in model output")]
    NoJsonFound,
    #[error("model output is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("model output has no hsCode")]
    MissingCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelVerdict {
    Classification(ClassificationResult),
    Clarification(ClarificationRequest),
}

/// Result of the clarification-check call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaguenessAssessment {
    pub is_too_vague: bool,
    /// 0 to 10.
    pub specificity_score: Option<u8>,
    pub product_type: Option<String>,
    pub clarifications: Vec<String>,
}

impl VaguenessAssessment {
    pub fn needs_clarification(&self, min_specificity: u8) -> bool {
        self.is_too_vague || self.specificity_score.is_some_and(|s| s < min_specificity)
    }
}

/// The first `{` through the last `}`.
pub fn json_span(raw: &str) -> Result<&str, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::EmptyOutput);
    }
    let start = raw.find('{').ok_or(ValidationError::NoJsonFound)?;
    let end = raw.rfind('}').ok_or(ValidationError::NoJsonFound)?;
    if end < start {
        return Err(ValidationError::NoJsonFound);
    }
    Ok(&raw[start..=end])
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ValidationError> {
    let span = json_span(raw)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::MalformedJson("expected a JSON object".into())),
        Err(e) => Err(ValidationError::MalformedJson(e.to_string())),
    }
}

/// Strips separators, left-pads to 8 digits, keeps the first 8 if longer.
pub fn normalize_code(value: &Value) -> Option<String> {
    let digits: String = match value {
        Value::String(s) => s.chars().filter(char::is_ascii_digit).collect(),
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(u), _) => u.to_string(),
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f < 1e16 => format!("{f:.0}"),
            _ => return None,
        },
        _ => return None,
    };
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().take(HS_CODE_DIGITS).collect();
    Some(format!("{digits:0>width$}", width = HS_CODE_DIGITS))
}

fn number_like(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn clamp_to(value: f64, max: u8) -> u8 {
    value.round().clamp(0.0, f64::from(max)) as u8
}

fn confidence(map: &Map<String, Value>) -> Option<u8> {
    map.get("confidence").and_then(number_like).map(|n| clamp_to(n, 100))
}

fn strings(value: Option<&Value>, limit: usize) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ Value::String(_)) => vec![v],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn related_codes(value: Option<&Value>) -> Vec<RelatedCode> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let code = normalize_code(obj.get("code")?)?;
            let description = text(obj, "description").unwrap_or_default();
            Some(RelatedCode {
                code,
                description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
            })
        })
        .take(MAX_RELATED_CODES)
        .collect()
}

/// Parses model output into a classification or a clarification request.
///
/// A non-empty `clarificationQuestions` list wins over any `hsCode`.
/// `description` is left empty when the model omits it.
pub fn validate(raw: &str, default_confidence: u8) -> Result<ModelVerdict, ValidationError> {
    let map = parse_object(raw)?;

    let questions = strings(map.get("clarificationQuestions"), MAX_CLARIFICATION_QUESTIONS);
    if !questions.is_empty() {
        return Ok(ModelVerdict::Clarification(ClarificationRequest {
            message: text(&map, "message")
                .unwrap_or_else(|| DEFAULT_CLARIFICATION_MESSAGE.to_string()),
            clarification_questions: questions,
            confidence: confidence(&map),
        }));
    }

    let hs_code = map
        .get("hsCode")
        .and_then(normalize_code)
        .ok_or(ValidationError::MissingCode)?;

    Ok(ModelVerdict::Classification(ClassificationResult {
        hs_code,
        description: truncate_chars(
            &text(&map, "description").unwrap_or_default(),
            MAX_DESCRIPTION_CHARS,
        ),
        confidence: confidence(&map).unwrap_or(default_confidence.min(100)),
        reasons: strings(map.get("reasons"), MAX_REASONS),
        related_codes: related_codes(map.get("relatedCodes")),
    }))
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub fn validate_vagueness(raw: &str) -> Result<VaguenessAssessment, ValidationError> {
    let map = parse_object(raw)?;
    Ok(VaguenessAssessment {
        is_too_vague: flag(map.get("isTooVague")),
        specificity_score: map
            .get("specificityScore")
            .and_then(number_like)
            .map(|n| clamp_to(n, 10)),
        product_type: text(&map, "productType"),
        clarifications: strings(map.get("clarifications"), MAX_CLARIFICATION_QUESTIONS),
    })
}
