//! Tariff text extraction: turns the text of a tariff document into ordered
//! `code -> description` records.

use crate::config::TariffConfig;
use crate::models::{truncate_chars, TariffRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Eight ASCII digits, one space/hyphen/en-dash, then anything non-empty.
/// The remainder may be separators only; the description then comes from continuation lines.
static RECORD_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{8})[\s\-–](.+)$").unwrap());

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-' || c == '–'
}

static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Continuation text stops being appended once a description reaches this many chars.
    pub max_description_chars: Option<usize>,
    /// Continuation lines shorter than this are treated as noise.
    pub min_continuation_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_description_chars: Some(500),
            min_continuation_chars: 3,
        }
    }
}

impl From<&TariffConfig> for ExtractOptions {
    fn from(cfg: &TariffConfig) -> Self {
        Self {
            max_description_chars: (cfg.max_description_chars > 0)
                .then_some(cfg.max_description_chars),
            min_continuation_chars: cfg.min_continuation_chars,
        }
    }
}

struct Accumulator {
    code: String,
    description: String,
    chars: usize,
}

impl Accumulator {
    fn new(code: &str, seed: &str) -> Self {
        let description = seed.trim_start_matches(is_separator).trim().to_string();
        Self {
            code: code.to_string(),
            chars: description.chars().count(),
            description,
        }
    }

    fn append(&mut self, text: &str, cap: Option<usize>) {
        if cap.is_some_and(|max| self.chars >= max) {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
            self.chars += 1;
        }
        self.description.push_str(text);
        self.chars += text.chars().count();
    }

    fn flush(self, cap: Option<usize>, out: &mut Vec<TariffRecord>) {
        let description = self.description.trim();
        if description.is_empty() {
            return;
        }
        let description = match cap {
            Some(max) => truncate_chars(description, max),
            None => description.to_string(),
        };
        out.push(TariffRecord {
            code: self.code,
            description,
        });
    }
}

/// Scans `text` line by line and returns every record in document order.
///
/// Never fails: unrecognised input yields fewer (possibly zero) records.
/// Repeated codes are kept as separate records.
pub fn extract_records(text: &str, opts: &ExtractOptions) -> Vec<TariffRecord> {
    let mut records = Vec::new();
    let mut current: Option<Accumulator> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(caps) = RECORD_START.captures(trimmed) {
            if let Some(acc) = current.take() {
                acc.flush(opts.max_description_chars, &mut records);
            }
            current = Some(Accumulator::new(&caps[1], &caps[2]));
            continue;
        }

        let Some(acc) = current.as_mut() else {
            continue;
        };
        if trimmed.is_empty()
            || PAGE_NUMBER.is_match(trimmed)
            || trimmed.chars().count() < opts.min_continuation_chars
        {
            continue;
        }
        acc.append(trimmed, opts.max_description_chars);
    }

    if let Some(acc) = current {
        acc.flush(opts.max_description_chars, &mut records);
    }
    records
}

/// Reads the tariff document text from disk. PDFs need the `pdf` feature.
pub fn read_source(path: &Path) -> anyhow::Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        pdf_text(path)
    } else {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(feature = "pdf")]
fn pdf_text(path: &Path) -> anyhow::Result<String> {
    Ok(pdf_extract::extract_text(path)?)
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(path: &Path) -> anyhow::Result<String> {
    anyhow::bail!(
        "{} is a PDF; rebuild with the `pdf` feature or supply extracted text",
        path.display()
    )
}
