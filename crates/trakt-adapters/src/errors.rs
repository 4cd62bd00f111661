use thiserror::Error;
use trakt_core::{DataError, SchemaError};
use trakt_policies::PolicyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Artifact kind cannot be empty.")]
    EmptyKind,
    #[error("Unknown artifact kind: {kind}{hint}")]
    UnknownKind { kind: String, hint: String },
    #[error("No input files found for '{artifact}' using source '{source_spec}'.")]
    NoInputFiles { artifact: String, source_spec: String },
    #[error("Input spec '{spec}' does not match expected file extension '{extension}'.")]
    Extension { spec: String, extension: String },
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
    #[error("CSV error in '{path}': {message}")]
    Csv { path: String, message: String },
    #[error("Artifact '{artifact}' option '{key}' is invalid: {message}")]
    Option { artifact: String, key: String, message: String },
    #[error("Artifact '{artifact}' stream source '{path}' has columns {got:?}, expected {expected:?}")]
    StreamColumns { artifact: String, path: String, expected: Vec<String>, got: Vec<String> },
    #[error("Cannot write {payload} payload for '{artifact}' as {format}")]
    Unsupported { artifact: String, payload: String, format: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Data(#[from] DataError),
}

impl AdapterError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        AdapterError::Io { path: path.display().to_string(),
                           message: err.to_string() }
    }
}
