//! Builder programático de pipelines.
//!
//! Equivalente en código al formato YAML: los steps se declaran por alias del
//! registry o con un handler directo, y `build` valida el resultado.
use std::sync::Arc;

use indexmap::IndexMap;

use crate::binding::Binding;
use crate::errors::DefinitionError;
use crate::model::{Artifact, ExecutionMode, OutputDataset};
use crate::pipeline::Pipeline;
use crate::registry::StepRegistry;
use crate::step::{Step, StepHandler};

enum StepSource {
    Uses(String),
    Handler(Arc<dyn StepHandler>),
}

pub struct WorkflowStep {
    id: String,
    source: StepSource,
    bindings: IndexMap<String, Binding>,
}

impl WorkflowStep {
    /// Step resuelto por alias al construir.
    pub fn uses(id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { id: id.into(),
               source: StepSource::Uses(alias.into()),
               bindings: IndexMap::new() }
    }

    /// Step con handler directo.
    pub fn handler<H>(id: impl Into<String>, handler: H) -> Self
        where H: StepHandler + 'static
    {
        Self { id: id.into(),
               source: StepSource::Handler(Arc::new(handler)),
               bindings: IndexMap::new() }
    }

    pub fn bind(mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.bindings.insert(name.into(), binding.into());
        self
    }
}

pub struct WorkflowBuilder {
    name: String,
    mode: ExecutionMode,
    strict: bool,
    inputs: Vec<Artifact>,
    steps: Vec<WorkflowStep>,
    outputs: Vec<OutputDataset>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               mode: ExecutionMode::Batch,
               strict: true,
               inputs: Vec::new(),
               steps: Vec::new(),
               outputs: Vec::new() }
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn input(mut self, artifact: Artifact) -> Self {
        self.inputs.push(artifact);
        self
    }

    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn output(mut self, name: impl Into<String>, from: impl Into<String>) -> Self {
        self.outputs.push(OutputDataset::new(name, from));
        self
    }

    pub fn dataset(mut self, dataset: OutputDataset) -> Self {
        self.outputs.push(dataset);
        self
    }

    /// Construye y valida el pipeline.
    pub fn build(self, registry: &StepRegistry) -> Result<Pipeline, DefinitionError> {
        let mut pipeline = Pipeline::new(self.name).with_mode(self.mode);
        for artifact in self.inputs {
            pipeline = pipeline.add_input(artifact);
        }
        for ws in self.steps {
            let (uses, handler) = match ws.source {
                StepSource::Uses(alias) => {
                    let handler = registry.resolve(&alias)?;
                    (alias, handler)
                }
                StepSource::Handler(handler) => (ws.id.clone(), handler),
            };
            pipeline = pipeline.add_step(Step::from_handler(ws.id, uses, handler, ws.bindings, self.strict)?);
        }
        for dataset in self.outputs {
            pipeline = pipeline.add_output(dataset);
        }
        pipeline.validate()?;
        Ok(pipeline)
    }
}
