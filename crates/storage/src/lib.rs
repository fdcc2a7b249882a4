//! Storage layer: derived tariff artifacts on disk.
//!
//! Everything written here is regenerable from the source tariff text; the
//! artifacts exist so a restart can skip extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub mod models;

use models::{CodeEntry, CodesFile};

pub const CODES_JSON: &str = "hs-codes.json";
pub const CODES_TEXT: &str = "hs-codes.txt";
pub const RAW_TEXT: &str = "tariff-raw.txt";
pub const RAW_TEXT_LIMIT: usize = 100_000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid codes file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub codes_json: PathBuf,
    pub codes_text: PathBuf,
    pub raw_text: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes the codes JSON, its plain-text mirror and a capped raw-text dump into `dir`.
pub fn write_artifacts(
    dir: &Path,
    codes: &[CodeEntry],
    raw_text: &str,
    extracted_at: DateTime<Utc>,
) -> Result<ArtifactPaths, StorageError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let paths = ArtifactPaths {
        codes_json: dir.join(CODES_JSON),
        codes_text: dir.join(CODES_TEXT),
        raw_text: dir.join(RAW_TEXT),
    };

    let file = CodesFile {
        extracted_at: Some(extracted_at.to_rfc3339()),
        total_codes: Some(codes.len()),
        codes: codes.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(|source| StorageError::Json {
        path: paths.codes_json.clone(),
        source,
    })?;
    fs::write(&paths.codes_json, json).map_err(io_err(&paths.codes_json))?;

    let mirror = codes
        .iter()
        .map(|c| format!("{} - {}", c.code, c.description))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&paths.codes_text, mirror).map_err(io_err(&paths.codes_text))?;

    let raw: String = raw_text.chars().take(RAW_TEXT_LIMIT).collect();
    fs::write(&paths.raw_text, raw).map_err(io_err(&paths.raw_text))?;

    info!(
        dir = %dir.display(),
        codes = codes.len(),
        "wrote tariff artifacts"
    );
    Ok(paths)
}

/// Reads a codes JSON written by [`write_artifacts`] or the `{metadata, codes}` database variant.
pub fn load_codes(path: &Path) -> Result<Vec<CodeEntry>, StorageError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    let file: CodesFile = serde_json::from_str(&content).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.codes)
}
