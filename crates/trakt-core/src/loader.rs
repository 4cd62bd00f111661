//! Carga de pipelines desde YAML.
//!
//! Formato:
//! ```yaml
//! name: sales
//! execution: { mode: batch }
//! inputs:
//!   raw: { kind: csv, uri: "raw/*.csv", combine_strategy: concat }
//!   lookup: lookup.csv
//! steps:
//!   - id: clean
//!     uses: rename
//!     with: { input: raw, policy: { const: { mapping: { amt: amount } } }, output: clean }
//! outputs:
//!   final: clean
//! ```
//! En modo estricto (por defecto) cualquier clave desconocida es un error con
//! sugerencia; en modo laxo las claves extra de un input pasan a su metadata y
//! el resto se ignora.
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::binding::Binding;
use crate::constants::DEFAULT_ARTIFACT_KIND;
use crate::errors::DefinitionError;
use crate::model::{Artifact, ArtifactSchema, CombineStrategy, ExecutionMode, OutputDataset};
use crate::pipeline::Pipeline;
use crate::registry::StepRegistry;
use crate::step::Step;
use crate::suggest;

const TOP_KEYS: &[&str] = &["name", "execution", "execution_mode", "inputs", "steps", "outputs"];
const EXECUTION_KEYS: &[&str] = &["mode"];
const INPUT_KEYS: &[&str] = &["kind", "uri", "schema", "metadata", "combine_strategy"];
const STEP_KEYS: &[&str] = &["id", "uses", "with"];
const DATASET_KEYS: &[&str] = &["name", "from", "kind", "uri", "metadata"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl LoadOptions {
    pub fn lenient() -> Self {
        Self { strict: false }
    }
}

/// Carga un pipeline en modo estricto.
pub fn load_pipeline(path: &Path, registry: &StepRegistry) -> Result<Pipeline, DefinitionError> {
    load_pipeline_with(path, registry, LoadOptions::default())
}

pub fn load_pipeline_with(path: &Path, registry: &StepRegistry, options: LoadOptions) -> Result<Pipeline, DefinitionError> {
    let source = std::fs::read_to_string(path).map_err(|e| DefinitionError::Io { path: path.display().to_string(),
                                                                                 message: e.to_string() })?;
    log::debug!("loading pipeline definition from {}", path.display());
    parse_pipeline(&source, &default_name(path), registry, options)
}

/// Nombre por defecto: directorio padre del archivo, o su stem.
fn default_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .or_else(|| path.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pipeline".to_string())
}

pub fn parse_pipeline(source: &str,
                      default_name: &str,
                      registry: &StepRegistry,
                      options: LoadOptions)
                      -> Result<Pipeline, DefinitionError> {
    let doc: Value = serde_yaml::from_str(source)?;
    let root = doc.as_object()
                  .ok_or_else(|| DefinitionError::Invalid("pipeline definition must be a mapping".into()))?;
    check_keys(root, TOP_KEYS, "pipeline", options)?;

    let name = match root.get("name") {
        None | Some(Value::Null) => default_name.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(DefinitionError::Invalid(format!("pipeline name must be a string, got {other}"))),
    };

    let mut pipeline = Pipeline::new(name).with_mode(parse_mode(root, options)?);

    if let Some(inputs) = root.get("inputs").filter(|v| !v.is_null()) {
        let inputs = inputs.as_object()
                           .ok_or_else(|| DefinitionError::Invalid("'inputs' must be a mapping".into()))?;
        for (input_name, spec) in inputs {
            pipeline = pipeline.add_input(parse_input(input_name, spec, options)?);
        }
    }

    if let Some(steps) = root.get("steps").filter(|v| !v.is_null()) {
        let steps = steps.as_array()
                         .ok_or_else(|| DefinitionError::Invalid("'steps' must be a list".into()))?;
        for (idx, spec) in steps.iter().enumerate() {
            pipeline = pipeline.add_step(parse_step(idx, spec, registry, options)?);
        }
    }

    if let Some(outputs) = root.get("outputs").filter(|v| !v.is_null()) {
        for dataset in parse_outputs(outputs, options)? {
            pipeline = pipeline.add_output(dataset);
        }
    }

    Ok(pipeline)
}

fn check_keys(map: &Map<String, Value>, allowed: &[&str], location: &str, options: LoadOptions) -> Result<(), DefinitionError> {
    if !options.strict {
        return Ok(());
    }
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(DefinitionError::UnknownKey { key: key.clone(),
                                                       location: location.to_string(),
                                                       hint: suggest::hint(key, allowed.iter().copied()) }),
        None => Ok(()),
    }
}

fn as_string(value: &Value, what: &str) -> Result<String, DefinitionError> {
    value.as_str()
         .map(str::to_string)
         .ok_or_else(|| DefinitionError::Invalid(format!("{what} must be a string, got {value}")))
}

fn as_metadata(value: Option<&Value>, what: &str) -> Result<IndexMap<String, Value>, DefinitionError> {
    match value {
        None | Some(Value::Null) => Ok(IndexMap::new()),
        Some(Value::Object(obj)) => Ok(obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(other) => Err(DefinitionError::Invalid(format!("{what} metadata must be a mapping, got {other}"))),
    }
}

fn parse_mode(root: &Map<String, Value>, options: LoadOptions) -> Result<ExecutionMode, DefinitionError> {
    let parse = |value: &Value| -> Result<ExecutionMode, DefinitionError> {
        let raw = as_string(value, "execution mode")?;
        ExecutionMode::parse(&raw).ok_or_else(|| {
                                      DefinitionError::Invalid(format!("unknown execution mode '{raw}' (expected batch or stream)"))
                                  })
    };

    let nested = match root.get("execution") {
        None | Some(Value::Null) => None,
        Some(Value::Object(exec)) => {
            check_keys(exec, EXECUTION_KEYS, "execution", options)?;
            exec.get("mode").map(parse).transpose()?
        }
        Some(other) => return Err(DefinitionError::Invalid(format!("'execution' must be a mapping, got {other}"))),
    };
    let flat = root.get("execution_mode").filter(|v| !v.is_null()).map(parse).transpose()?;

    match (nested, flat) {
        (Some(a), Some(b)) if a != b => {
            Err(DefinitionError::Invalid(format!("execution.mode '{a}' conflicts with execution_mode '{b}'")))
        }
        (Some(mode), _) | (None, Some(mode)) => Ok(mode),
        (None, None) => Ok(ExecutionMode::Batch),
    }
}

fn parse_input(name: &str, spec: &Value, options: LoadOptions) -> Result<Artifact, DefinitionError> {
    let obj = match spec {
        Value::String(uri) => return Ok(Artifact::new(name, DEFAULT_ARTIFACT_KIND, uri.clone())),
        Value::Null => return Ok(Artifact::new(name, DEFAULT_ARTIFACT_KIND, name)),
        Value::Object(obj) => obj,
        other => return Err(DefinitionError::Invalid(format!("input '{name}' must be a uri or a mapping, got {other}"))),
    };
    check_keys(obj, INPUT_KEYS, &format!("input '{name}'"), options)?;

    let kind = match obj.get("kind") {
        None | Some(Value::Null) => DEFAULT_ARTIFACT_KIND.to_string(),
        Some(v) => as_string(v, &format!("input '{name}' kind"))?,
    };
    let uri = match obj.get("uri") {
        None | Some(Value::Null) => name.to_string(),
        Some(v) => as_string(v, &format!("input '{name}' uri"))?,
    };
    let mut artifact = Artifact::new(name, kind, uri);

    if let Some(schema) = obj.get("schema").filter(|v| !v.is_null()) {
        artifact.schema = Some(ArtifactSchema::parse(name, schema)?);
    }
    artifact.metadata = as_metadata(obj.get("metadata"), &format!("input '{name}'"))?;
    if let Some(strategy) = obj.get("combine_strategy").filter(|v| !v.is_null()) {
        let raw = as_string(strategy, &format!("input '{name}' combine_strategy"))?;
        artifact.combine_strategy = CombineStrategy::parse(&raw).ok_or_else(|| {
            let known: Vec<&str> = CombineStrategy::ALL.iter().map(|s| s.as_str()).collect();
            DefinitionError::Invalid(format!("input '{name}' has unknown combine_strategy '{raw}' (expected one of {known:?})"))
        })?;
    }

    // Modo laxo: claves desconocidas pasan a metadata.
    for (key, value) in obj.iter().filter(|(k, _)| !INPUT_KEYS.contains(&k.as_str())) {
        artifact.metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Ok(artifact)
}

fn parse_step(idx: usize, spec: &Value, registry: &StepRegistry, options: LoadOptions) -> Result<Step, DefinitionError> {
    let obj = spec.as_object()
                  .ok_or_else(|| DefinitionError::Invalid(format!("step #{idx} must be a mapping")))?;
    let id = as_string(obj.get("id").unwrap_or(&Value::Null), &format!("step #{idx} id"))?;
    check_keys(obj, STEP_KEYS, &format!("step '{id}'"), options)?;
    let uses = as_string(obj.get("uses").unwrap_or(&Value::Null), &format!("step '{id}' uses"))?;

    let bindings: IndexMap<String, Binding> = match obj.get("with") {
        None | Some(Value::Null) => IndexMap::new(),
        Some(Value::Object(with)) => with.iter().map(|(k, v)| (k.clone(), Binding::from_json(v))).collect(),
        Some(other) => return Err(DefinitionError::Invalid(format!("step '{id}' 'with' must be a mapping, got {other}"))),
    };

    let handler = registry.resolve(&uses)?;
    Ok(Step::from_handler(id, uses, handler, bindings, options.strict)?)
}

fn parse_outputs(outputs: &Value, options: LoadOptions) -> Result<Vec<OutputDataset>, DefinitionError> {
    let obj = outputs.as_object()
                     .ok_or_else(|| DefinitionError::Invalid("'outputs' must be a mapping".into()))?;

    let Some(datasets) = obj.get("datasets") else {
        return obj.iter()
                  .map(|(name, source)| -> Result<OutputDataset, DefinitionError> {
                      Ok(OutputDataset::new(name.clone(), as_string(source, &format!("output '{name}' source"))?))
                  })
                  .collect();
    };

    check_keys(obj, &["datasets"], "outputs", options)?;
    let items = datasets.as_array()
                        .ok_or_else(|| DefinitionError::Invalid("'outputs.datasets' must be a list".into()))?;
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let ds = item.as_object()
                     .ok_or_else(|| DefinitionError::Invalid(format!("output dataset #{idx} must be a mapping")))?;
        let name = as_string(ds.get("name").unwrap_or(&Value::Null), &format!("output dataset #{idx} name"))?;
        check_keys(ds, DATASET_KEYS, &format!("output dataset '{name}'"), options)?;
        let source = as_string(ds.get("from").unwrap_or(&Value::Null), &format!("output dataset '{name}' from"))?;
        let mut dataset = OutputDataset::new(name.clone(), source);
        if let Some(kind) = ds.get("kind").filter(|v| !v.is_null()) {
            dataset.kind = Some(as_string(kind, &format!("output dataset '{name}' kind"))?);
        }
        if let Some(uri) = ds.get("uri").filter(|v| !v.is_null()) {
            dataset.uri = Some(as_string(uri, &format!("output dataset '{name}' uri"))?);
        }
        dataset.metadata = as_metadata(ds.get("metadata"), &format!("output dataset '{name}'"))?;
        out.push(dataset);
    }
    Ok(out)
}
