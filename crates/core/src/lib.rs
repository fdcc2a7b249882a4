//! Core library: tariff extraction, lexical matching, prompting, validation and classification.

pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod index;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod validator;

pub use classifier::{Classifier, ClassifierSettings};
pub use error::ClassifyError;
pub use index::TariffIndex;
