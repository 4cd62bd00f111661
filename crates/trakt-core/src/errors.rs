//! Errores del core.
//!
//! Cada familia de error nombra el step, artifact o campo responsable para
//! que el mensaje sea accionable sin necesidad de un stacktrace.

use std::fmt;

use thiserror::Error;

use crate::model::{CombineStrategy, ExecutionMode};

/// Errores de declaración o resolución de bindings.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BindingError {
    #[error("Step '{step_id}' binding error: {message}")]
    Invalid { step_id: String, message: String },
    #[error("Step '{step_id}' references unknown artifact '{name}'. Use Binding::Const or YAML {{const: ...}} for literal strings.")]
    UnknownArtifact { step_id: String, name: String },
    #[error("Step '{step_id}' did not return output '{key}'")]
    MissingOutputKey { step_id: String, key: String },
    #[error("Step '{step_id}' output '{key}': {message}")]
    OutputShape { step_id: String, key: String, message: String },
}

/// Errores sobre datos tabulares en memoria.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DataError {
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("row {row} has {got} cells, expected {expected}")]
    RowWidth { row: usize, expected: usize, got: usize },
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("cannot append chunk with columns {got:?} to columns {expected:?}")]
    ColumnsMismatch { expected: Vec<String>, got: Vec<String> },
    #[error("expected a table, got {0}")]
    NotATable(String),
    #[error("{0}")]
    Source(String),
}

/// Errores de schema: declaración inválida o datos que no cumplen.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SchemaError {
    #[error("Artifact '{artifact}' schema is invalid: {message}")]
    Invalid { artifact: String, message: String },
    #[error("Artifact '{artifact}' source '{origin}' schema columns mismatch: expected={expected:?}, got={got:?}")]
    ColumnsMismatch { artifact: String, origin: String, expected: Vec<String>, got: Vec<String> },
    #[error("Artifact '{artifact}' source '{origin}' schema columns mismatch: missing={missing:?}, extra={extra:?}")]
    MissingExtra { artifact: String, origin: String, missing: Vec<String>, extra: Vec<String> },
    #[error("Artifact '{artifact}' source '{origin}' schema dtypes mismatch: {column} expected={expected} got={got}")]
    DtypeMismatch { artifact: String, origin: String, column: String, expected: String, got: String },
}

/// Error devuelto por un handler de step.
///
/// `kind` es el nombre del tipo de error original; el runner lo persiste como
/// `error.type` en el manifest.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{message}")]
pub struct StepError {
    pub kind: String,
    pub message: String,
}

impl StepError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(),
               message: message.into() }
    }

    /// Error genérico sin tipo específico.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("StepError", message)
    }

    /// Captura el nombre del tipo de un error arbitrario.
    pub fn from_error<E>(err: &E) -> Self
        where E: std::error::Error
    {
        Self::new(short_type_name::<E>(), err.to_string())
    }
}

impl From<DataError> for StepError {
    fn from(err: DataError) -> Self {
        StepError::from_error(&err)
    }
}

impl From<BindingError> for StepError {
    fn from(err: BindingError) -> Self {
        StepError::from_error(&err)
    }
}

/// Último segmento de `std::any::type_name`, sin parámetros genéricos.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Alias desconocido en el registry.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RegistryError {
    #[error("Unknown step alias '{alias}'{hint}")]
    UnknownAlias { alias: String, hint: String },
}

/// Errores al construir un pipeline desde YAML, overrides o el builder.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{0}")]
    Invalid(String),
    #[error("Unknown key '{key}' in {location}{hint}")]
    UnknownKey { key: String, location: String, hint: String },
    #[error("cannot read pipeline file '{path}': {message}")]
    Io { path: String, message: String },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Validation(#[from] PipelineValidationError),
}

/// Resultado agregado de validar un pipeline. Todas las categorías se
/// acumulan antes de reportar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineValidationError {
    pub pipeline: String,
    pub duplicate_steps: Vec<String>,
    pub incompatible_steps: Vec<(String, ExecutionMode)>,
    /// `(step_id, nombre)`
    pub missing_inputs: Vec<(String, String)>,
    pub unused_inputs: Vec<String>,
    /// `(step_id, nombre, productor previo)`
    pub output_collisions: Vec<(String, String, String)>,
    /// `(output, source)`
    pub unknown_outputs: Vec<(String, String)>,
    pub stream_combine_violations: Vec<(String, CombineStrategy)>,
}

impl PipelineValidationError {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self { pipeline: pipeline.into(),
               ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.duplicate_steps.is_empty()
        && self.incompatible_steps.is_empty()
        && self.missing_inputs.is_empty()
        && self.unused_inputs.is_empty()
        && self.output_collisions.is_empty()
        && self.unknown_outputs.is_empty()
        && self.stream_combine_violations.is_empty()
    }

    fn parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if !self.duplicate_steps.is_empty() {
            parts.push(format!("duplicate step ids: {}", self.duplicate_steps.join(", ")));
        }
        if !self.incompatible_steps.is_empty() {
            let items: Vec<String> = self.incompatible_steps
                                         .iter()
                                         .map(|(step, mode)| format!("{step} does not support {mode} mode"))
                                         .collect();
            parts.push(format!("incompatible steps: {}", items.join(", ")));
        }
        if !self.missing_inputs.is_empty() {
            let items: Vec<String> = self.missing_inputs
                                         .iter()
                                         .map(|(step, name)| format!("{step} -> {name}"))
                                         .collect();
            parts.push(format!("missing inputs: {}", items.join(", ")));
        }
        if !self.unused_inputs.is_empty() {
            parts.push(format!("unused inputs: {}", self.unused_inputs.join(", ")));
        }
        if !self.output_collisions.is_empty() {
            let items: Vec<String> = self.output_collisions
                                         .iter()
                                         .map(|(step, name, owner)| format!("{step} -> {name} (already produced by {owner})"))
                                         .collect();
            parts.push(format!("output collisions: {}", items.join(", ")));
        }
        if !self.unknown_outputs.is_empty() {
            let items: Vec<String> = self.unknown_outputs
                                         .iter()
                                         .map(|(output, source)| format!("{output} <- {source}"))
                                         .collect();
            parts.push(format!("unknown output sources: {}", items.join(", ")));
        }
        if !self.stream_combine_violations.is_empty() {
            let items: Vec<String> = self.stream_combine_violations
                                         .iter()
                                         .map(|(input, strategy)| format!("{input} ({strategy})"))
                                         .collect();
            parts.push(format!("stream mode requires combine_strategy 'concat': {}", items.join(", ")));
        }
        parts
    }
}

impl fmt::Display for PipelineValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline '{}' is invalid: {}", self.pipeline, self.parts().join("; "))
    }
}

impl std::error::Error for PipelineValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn step_error_captures_type_name() {
        let err = StepError::from_error(&Boom);
        assert_eq!(err.kind, "Boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn validation_message_joins_categories() {
        let mut err = PipelineValidationError::new("p");
        err.missing_inputs.push(("b".into(), "x".into()));
        err.unused_inputs.push("raw".into());
        let msg = err.to_string();
        assert!(msg.contains("missing inputs: b -> x; unused inputs: raw"), "{msg}");
        assert!(!err.is_empty());
    }
}
