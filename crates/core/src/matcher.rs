//! Local keyword/phrase matching against tariff descriptions. No network, no state.

use crate::models::{
    truncate_chars, ClassificationResult, RelatedCode, TariffRecord, MAX_DESCRIPTION_CHARS,
    MAX_REASONS, MAX_RELATED_CODES,
};

const PHRASE_BONUS: f64 = 100.0;
const TOKEN_BONUS: f64 = 10.0;
const LENGTH_PENALTY_DIVISOR: f64 = 100.0;
const MAX_RUNNERS_UP: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub record: &'a TariffRecord,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatch<'a> {
    pub best: ScoredCandidate<'a>,
    pub runners_up: Vec<ScoredCandidate<'a>>,
    /// `min(100, max(50, score * 5))`
    pub confidence: u8,
}

struct Query<'q> {
    phrase: String,
    tokens: Vec<&'q str>,
}

impl<'q> Query<'q> {
    fn new(raw: &'q str) -> Self {
        Self {
            phrase: raw.trim().to_lowercase(),
            tokens: raw.split_whitespace().collect(),
        }
    }

    fn matched_tokens(&self, description_lower: &str) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| description_lower.contains(t.as_str()))
            .collect()
    }
}

/// Phrase bonus + per-token bonus - length penalty. Both sides are compared lower-cased.
pub fn score(query: &str, description: &str) -> f64 {
    score_with(&Query::new(query), description)
}

fn score_with(query: &Query<'_>, description: &str) -> f64 {
    let desc = description.to_lowercase();
    let mut score = 0.0;
    if !query.phrase.is_empty() && desc.contains(&query.phrase) {
        score += PHRASE_BONUS;
    }
    score += TOKEN_BONUS * query.matched_tokens(&desc).len() as f64;
    score - description.chars().count() as f64 / LENGTH_PENALTY_DIVISOR
}

/// Every record scored, highest first. Equal scores keep document order.
pub fn rank<'a>(query: &str, records: &'a [TariffRecord]) -> Vec<ScoredCandidate<'a>> {
    let parsed = Query::new(query);
    let mut scored: Vec<ScoredCandidate<'a>> = records
        .iter()
        .map(|record| ScoredCandidate {
            record,
            score: score_with(&parsed, &record.description),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

pub fn normalized_confidence(score: f64) -> u8 {
    (score * 5.0).clamp(50.0, 100.0).round() as u8
}

/// Best candidate and up to three runners-up, or `None` when the top score is below `min_score`.
/// Runners-up must clear `min_score` as well.
pub fn best_match<'a>(
    query: &str,
    records: &'a [TariffRecord],
    min_score: f64,
) -> Option<LocalMatch<'a>> {
    let mut ranked = rank(query, records).into_iter();
    let best = ranked.next().filter(|c| c.score >= min_score)?;
    let runners_up = ranked
        .take_while(|c| c.score >= min_score)
        .take(MAX_RUNNERS_UP)
        .collect();
    Some(LocalMatch {
        confidence: normalized_confidence(best.score),
        best,
        runners_up,
    })
}

impl LocalMatch<'_> {
    pub fn is_confident(&self, accept_confidence: u8) -> bool {
        self.confidence >= accept_confidence
    }

    pub fn to_result(&self, query: &str) -> ClassificationResult {
        let parsed = Query::new(query);
        let desc = self.best.record.description.to_lowercase();
        let matched = parsed.matched_tokens(&desc);

        let mut reasons = Vec::new();
        if !parsed.phrase.is_empty() && desc.contains(&parsed.phrase) {
            reasons.push(format!(
                "Tariff description contains the phrase \"{}\"",
                parsed.phrase
            ));
        }
        if !matched.is_empty() {
            reasons.push(format!(
                "Matched {} of {} query terms: {}",
                matched.len(),
                parsed.tokens.len(),
                matched.join(", ")
            ));
        }
        reasons.push("Selected by local keyword matching against the tariff schedule".to_string());
        reasons.truncate(MAX_REASONS);

        ClassificationResult {
            hs_code: self.best.record.code.clone(),
            description: truncate_chars(&self.best.record.description, MAX_DESCRIPTION_CHARS),
            confidence: self.confidence,
            reasons,
            related_codes: self
                .runners_up
                .iter()
                .take(MAX_RELATED_CODES)
                .map(|c| RelatedCode {
                    code: c.record.code.clone(),
                    description: truncate_chars(&c.record.description, MAX_DESCRIPTION_CHARS),
                })
                .collect(),
        }
    }
}
