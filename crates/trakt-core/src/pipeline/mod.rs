//! Pipeline: inputs, steps ordenados y datasets de salida.
//!
//! La validación (`validate`) es pura e idempotente; el runner la ejecuta
//! antes de tocar cualquier dato.

pub mod validator;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::constants::ENGINE_VERSION;
use crate::errors::PipelineValidationError;
use crate::hashing::hash_value;
use crate::model::{Artifact, ExecutionMode, OutputDataset};
use crate::step::Step;

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub execution_mode: ExecutionMode,
    pub inputs: IndexMap<String, Artifact>,
    pub steps: Vec<Step>,
    pub outputs: IndexMap<String, OutputDataset>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               execution_mode: ExecutionMode::Batch,
               inputs: IndexMap::new(),
               steps: Vec::new(),
               outputs: IndexMap::new() }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn add_input(mut self, artifact: Artifact) -> Self {
        self.inputs.insert(artifact.name.clone(), artifact);
        self
    }

    pub fn add_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_output(mut self, dataset: OutputDataset) -> Self {
        self.outputs.insert(dataset.name.clone(), dataset);
        self
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        validator::validate(self)
    }

    /// Representación JSON estable de la definición (sin handlers).
    pub fn definition_json(&self) -> Value {
        let steps: Vec<Value> = self.steps
                                    .iter()
                                    .map(|s| {
                                        let with: serde_json::Map<String, Value> =
                                            s.bindings.iter().map(|(k, b)| (k.clone(), b.to_json())).collect();
                                        json!({ "id": s.id, "uses": s.uses, "with": with })
                                    })
                                    .collect();
        json!({
            "engine_version": ENGINE_VERSION,
            "name": self.name,
            "execution_mode": self.execution_mode.as_str(),
            "inputs": self.inputs.values().map(|a| serde_json::to_value(a).unwrap_or(Value::Null)).collect::<Vec<_>>(),
            "steps": steps,
            "outputs": self.outputs.values().map(|o| serde_json::to_value(o).unwrap_or(Value::Null)).collect::<Vec<_>>(),
        })
    }

    /// Hash blake3 del JSON canónico de la definición.
    pub fn definition_hash(&self) -> String {
        hash_value(&self.definition_json())
    }
}
