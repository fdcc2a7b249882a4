//! The immutable tariff data shared by every request.

use crate::config::TariffConfig;
use crate::extractor::{extract_records, ExtractOptions};
use crate::models::{truncate_chars, TariffRecord};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Built from extracted records.
    Records,
    /// No records could be extracted; a window of the raw document text is used.
    RawText,
}

/// Bounded excerpt of the tariff embedded in model prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffContext {
    pub text: String,
    pub source: ContextSource,
    /// Number of records represented in `text` (0 for raw text).
    pub records_used: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    pub max_records: usize,
    pub max_chars: usize,
    pub raw_chars: usize,
}

impl From<&TariffConfig> for ContextLimits {
    fn from(cfg: &TariffConfig) -> Self {
        Self {
            max_records: cfg.context_max_records,
            max_chars: cfg.context_max_chars,
            raw_chars: cfg.raw_context_chars,
        }
    }
}

impl TariffContext {
    /// One `HS Code: CODE - description` line per record, stopping at whichever
    /// limit is reached first.
    pub fn from_records(records: &[TariffRecord], limits: ContextLimits) -> Self {
        let mut text = String::new();
        let mut chars = 0usize;
        let mut used = 0usize;
        for record in records.iter().take(limits.max_records) {
            let line = format!("HS Code: {} - {}", record.code, record.description);
            let needed = line.chars().count() + usize::from(used > 0);
            if chars + needed > limits.max_chars {
                break;
            }
            if used > 0 {
                text.push('\n');
            }
            text.push_str(&line);
            chars += needed;
            used += 1;
        }
        Self {
            text,
            source: ContextSource::Records,
            records_used: used,
        }
    }

    pub fn from_raw_text(raw: &str, limits: ContextLimits) -> Self {
        Self {
            text: truncate_chars(raw, limits.raw_chars),
            source: ContextSource::RawText,
            records_used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Records plus derived prompt context, built once at startup and then only read.
#[derive(Debug, Clone)]
pub struct TariffIndex {
    records: Vec<TariffRecord>,
    context: TariffContext,
    loaded_at: DateTime<Utc>,
}

impl TariffIndex {
    /// Extracts records from document text; falls back to a raw-text context when none are found.
    pub fn from_text(text: &str, cfg: &TariffConfig) -> Self {
        let records = extract_records(text, &ExtractOptions::from(cfg));
        let limits = ContextLimits::from(cfg);
        let context = if records.is_empty() {
            TariffContext::from_raw_text(text, limits)
        } else {
            TariffContext::from_records(&records, limits)
        };
        Self {
            records,
            context,
            loaded_at: Utc::now(),
        }
    }

    pub fn from_records(records: Vec<TariffRecord>, cfg: &TariffConfig) -> Self {
        let context = TariffContext::from_records(&records, ContextLimits::from(cfg));
        Self {
            records,
            context,
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[TariffRecord] {
        &self.records
    }

    pub fn context(&self) -> &TariffContext {
        &self.context
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// True when neither records nor a usable context exist.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.context.is_empty()
    }

    /// First record carrying `code`, in document order.
    pub fn lookup(&self, code: &str) -> Option<&TariffRecord> {
        self.records.iter().find(|r| r.code == code)
    }
}
