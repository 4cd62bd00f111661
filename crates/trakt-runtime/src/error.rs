//! Errores de ejecución.
//!
//! `type_name()` es lo que el manifest registra como `error.type`.
use thiserror::Error;
use trakt_adapters::AdapterError;
use trakt_core::{BindingError, DataError, PipelineValidationError, StepError};
use trakt_policies::PolicyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] PipelineValidationError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("Step '{step_id}' failed: {source}")]
    Step { step_id: String, source: StepError },
    #[error("Pipeline output '{output}' references unknown artifact '{source_name}'.")]
    UnknownOutput { output: String, source_name: String },
    #[error("Failed to write manifest '{path}': {message}")]
    Manifest { path: String, message: String },
}

impl RunError {
    pub fn type_name(&self) -> String {
        match self {
            RunError::Validation(_) => "PipelineValidationError".to_string(),
            RunError::Binding(_) => "BindingError".to_string(),
            RunError::Adapter(_) => "AdapterError".to_string(),
            RunError::Policy(_) => "PolicyError".to_string(),
            RunError::Data(_) => "DataError".to_string(),
            RunError::Step { source, .. } => source.kind.clone(),
            RunError::UnknownOutput { .. } => "KeyError".to_string(),
            RunError::Manifest { .. } => "ManifestError".to_string(),
        }
    }

    /// Mensaje persistido: para fallos de step, el del error original.
    pub fn message(&self) -> String {
        match self {
            RunError::Step { source, .. } => source.message.clone(),
            other => other.to_string(),
        }
    }
}
