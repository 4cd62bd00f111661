//! Artifacts declarados por un pipeline.
//!
//! Un `Artifact` describe una fuente de datos de entrada: nombre lógico,
//! `kind` (qué adapter la lee), `uri`, schema opcional, metadata libre y la
//! estrategia para combinar múltiples archivos. Es inmutable una vez definido
//! salvo por los overrides de `uri` aplicados por el runner.
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::ArtifactSchema;
use crate::constants::DEFAULT_ARTIFACT_KIND;

/// Cómo se combinan varias partes de un mismo input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineStrategy {
    #[default]
    Concat,
    UnionByName,
    ValidateSchema,
}

impl CombineStrategy {
    pub const ALL: [CombineStrategy; 3] = [CombineStrategy::Concat, CombineStrategy::UnionByName, CombineStrategy::ValidateSchema];

    pub fn as_str(&self) -> &'static str {
        match self {
            CombineStrategy::Concat => "concat",
            CombineStrategy::UnionByName => "union_by_name",
            CombineStrategy::ValidateSchema => "validate_schema",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let norm = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == norm)
    }
}

impl fmt::Display for CombineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Batch,
    Stream,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Batch => "batch",
            ExecutionMode::Stream => "stream",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "batch" => Some(ExecutionMode::Batch),
            "stream" => Some(ExecutionMode::Stream),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub kind: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ArtifactSchema>,
    #[serde(default)]
    pub metadata: IndexMap<String, Value>,
    #[serde(default)]
    pub combine_strategy: CombineStrategy,
}

impl Artifact {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, uri: impl Into<String>) -> Self {
        Self { name: name.into(),
               kind: kind.into(),
               uri: uri.into(),
               schema: None,
               metadata: IndexMap::new(),
               combine_strategy: CombineStrategy::default() }
    }

    pub fn csv(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_ARTIFACT_KIND, uri)
    }

    pub fn with_schema(mut self, schema: ArtifactSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_combine_strategy(mut self, strategy: CombineStrategy) -> Self {
        self.combine_strategy = strategy;
        self
    }

    /// Kind normalizado (trim + minúsculas).
    pub fn normalized_kind(&self) -> String {
        self.kind.trim().to_ascii_lowercase()
    }

    /// `false` sólo si la metadata declara `required` como falso
    /// (`false`, `"false"`, `"0"`, `"no"`).
    pub fn is_required(&self) -> bool {
        match self.metadata.get("required") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"),
            Some(Value::Number(n)) => n.as_f64() != Some(0.0),
            _ => true,
        }
    }
}

/// Dataset de salida: publica el artifact `source` bajo `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDataset {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub metadata: IndexMap<String, Value>,
}

impl OutputDataset {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(),
               source: source.into(),
               kind: None,
               uri: None,
               metadata: IndexMap::new() }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}
