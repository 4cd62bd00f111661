use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::StepError;
use crate::model::{Context, Payload, Table};

/// Modos de ejecución soportados por un handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub batch: bool,
    pub stream: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { batch: true,
               stream: false }
    }
}

impl Capabilities {
    pub fn all() -> Self {
        Self { batch: true,
               stream: true }
    }
}

/// Inputs ya resueltos que recibe un handler, indexados por nombre declarado.
#[derive(Debug, Clone, Default)]
pub struct StepInputs {
    values: IndexMap<String, Payload>,
}

impl StepInputs {
    pub fn new(values: IndexMap<String, Payload>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.values.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<Payload> {
        self.values.shift_remove(name)
    }

    pub fn require(&self, name: &str) -> Result<&Payload, StepError> {
        self.values
            .get(name)
            .ok_or_else(|| StepError::new("MissingInput", format!("input '{name}' was not provided")))
    }

    /// Input como tabla materializada (los streams se colectan).
    pub fn table(&self, name: &str) -> Result<Table, StepError> {
        Ok(self.require(name)?.to_table()?)
    }

    /// Input como valor JSON literal.
    pub fn value(&self, name: &str) -> Result<Value, StepError> {
        self.require(name)?
            .to_json()
            .ok_or_else(|| StepError::new("InvalidInput", format!("input '{name}' is not a literal value")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resultado de un step: datos por nombre de output declarado y métricas
/// separadas estructuralmente.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub data: IndexMap<String, Payload>,
    pub metrics: IndexMap<String, Value>,
}

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::new().with(name, payload)
    }

    pub fn with(mut self, name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        self.data.insert(name.into(), payload.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }
}

/// Implementación de un step. Los nombres declarados fijan qué bindings son
/// inputs y cuáles outputs.
pub trait StepHandler: Send + Sync {
    fn declared_inputs(&self) -> Vec<String> {
        Vec::new()
    }

    fn declared_outputs(&self) -> Vec<String> {
        Vec::new()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn run(&self, ctx: &Context, inputs: StepInputs) -> Result<StepOutput, StepError>;
}

/// Handler a partir de una clausura.
pub struct FnStep<F> {
    inputs: Vec<String>,
    outputs: Vec<String>,
    capabilities: Capabilities,
    func: F,
}

impl<F> FnStep<F>
    where F: Fn(&Context, StepInputs) -> Result<StepOutput, StepError> + Send + Sync
{
    pub fn new(inputs: &[&str], outputs: &[&str], func: F) -> Self {
        Self { inputs: inputs.iter().map(|s| s.to_string()).collect(),
               outputs: outputs.iter().map(|s| s.to_string()).collect(),
               capabilities: Capabilities::default(),
               func }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl<F> StepHandler for FnStep<F>
    where F: Fn(&Context, StepInputs) -> Result<StepOutput, StepError> + Send + Sync
{
    fn declared_inputs(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn declared_outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn run(&self, ctx: &Context, inputs: StepInputs) -> Result<StepOutput, StepError> {
        (self.func)(ctx, inputs)
    }
}
