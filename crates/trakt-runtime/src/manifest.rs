//! Manifest de ejecución.
//!
//! Se escribe siempre, haya éxito o fallo, como JSON indentado con salto de
//! línea final.
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub version: Option<String>,
    pub definition_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputStats {
    pub source: String,
    pub files_read: usize,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub path: String,
    pub rows: Option<usize>,
    pub kind: String,
    pub source: String,
}

/// Reporte por step, tal como se persiste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step_id: String,
    pub rows_in: Option<usize>,
    pub rows_out: Option<usize>,
    pub duration_ms: f64,
    pub outputs: Vec<String>,
    pub metrics: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_dropped: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_unmatched: Option<Value>,
}

impl StepReport {
    /// `rows_dropped`/`rows_unmatched` se elevan desde las métricas del step.
    pub fn new(step_id: impl Into<String>,
               rows_in: Option<usize>,
               rows_out: Option<usize>,
               duration_ms: f64,
               outputs: Vec<String>,
               metrics: IndexMap<String, Value>)
               -> Self {
        Self { step_id: step_id.into(),
               rows_in,
               rows_out,
               duration_ms,
               outputs,
               rows_dropped: metrics.get("rows_dropped").cloned(),
               rows_unmatched: metrics.get("rows_unmatched").cloned(),
               metrics }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<&RunError> for ErrorInfo {
    fn from(err: &RunError) -> Self {
        Self { error_type: err.type_name(),
               message: err.message() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub status: RunStatus,
    pub pipeline: PipelineInfo,
    pub runner: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: f64,
    pub inputs: IndexMap<String, InputStats>,
    pub steps: Vec<StepReport>,
    pub outputs: IndexMap<String, OutputRecord>,
    pub error: Option<ErrorInfo>,
}

/// Escribe el manifest creando los directorios padre.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), RunError> {
    let fail = |message: String| RunError::Manifest { path: path.display().to_string(),
                                                      message };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }
    let mut body = serde_json::to_string_pretty(manifest).map_err(|e| fail(e.to_string()))?;
    body.push('\n');
    fs::write(path, body).map_err(|e| fail(e.to_string()))
}

/// Lee un manifest previamente escrito.
pub fn read_manifest(path: &Path) -> Result<Manifest, RunError> {
    let fail = |message: String| RunError::Manifest { path: path.display().to_string(),
                                                      message };
    let body = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| fail(e.to_string()))
}
