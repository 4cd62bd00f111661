//! Errores de políticas.

use thiserror::Error;
use trakt_core::{DataError, SchemaError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Invalid {policy} policy: {message}")]
    Invalid { policy: &'static str, message: String },
    #[error("{policy} policy: missing columns {columns:?}{context}")]
    MissingColumns { policy: &'static str, columns: Vec<String>, context: String },
    #[error("{policy} policy produced duplicate columns {columns:?}")]
    DuplicateColumns { policy: &'static str, columns: Vec<String> },
    #[error("Join policy failed due to {count} unmatched rows.")]
    JoinUnmatched { count: usize },
    #[error("Quality gate '{gate}' failed: {message}")]
    QualityGate { gate: String, message: String },
    #[error("Cannot combine parts of artifact '{artifact}': {message}")]
    Combine { artifact: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Data(#[from] DataError),
}

impl PolicyError {
    pub(crate) fn invalid(policy: &'static str, message: impl Into<String>) -> Self {
        PolicyError::Invalid { policy,
                               message: message.into() }
    }
}
