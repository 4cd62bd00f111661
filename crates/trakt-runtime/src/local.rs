//! Runner local: inputs y outputs en el filesystem.
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::json;
use trakt_adapters::{output_target_path, resolve_input_paths, AdapterError, AdapterRegistry};
use trakt_core::constants::{DEFAULT_ARTIFACT_KIND, DEFAULT_STREAM_CHUNK_SIZE, MANIFEST_FILE_NAME};
use trakt_core::telemetry::attributes_from;
use trakt_core::{Artifact, Context, Namespace, NoopTracer, Pipeline, Tracer};

use crate::config::RunnerConfig;
use crate::error::RunError;
use crate::manifest::{InputStats, OutputRecord};
use crate::runner::{LoadedInputs, Runner};
use crate::telemetry::get_tracer;

#[derive(Clone)]
pub struct LocalRunner {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// `input -> uri`, con prioridad sobre la `uri` declarada.
    pub input_overrides: IndexMap<String, String>,
    pub adapters: AdapterRegistry,
    pub output_kind: String,
    pub stream_chunk_size: usize,
    pub manifest_path: Option<PathBuf>,
    tracer: Arc<dyn Tracer>,
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new(".", "outputs")
    }
}

impl LocalRunner {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self { input_dir: input_dir.into(),
               output_dir: output_dir.into(),
               input_overrides: IndexMap::new(),
               adapters: AdapterRegistry::with_defaults(),
               output_kind: DEFAULT_ARTIFACT_KIND.to_string(),
               stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
               manifest_path: None,
               tracer: Arc::new(NoopTracer) }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self { input_dir: config.input_dir.clone(),
               output_dir: config.output_dir.clone(),
               input_overrides: IndexMap::new(),
               adapters: AdapterRegistry::with_defaults(),
               output_kind: config.output_kind.clone(),
               stream_chunk_size: config.stream_chunk_size,
               manifest_path: config.manifest_path.clone(),
               tracer: get_tracer(config) }
    }

    pub fn with_input_overrides(mut self, overrides: IndexMap<String, String>) -> Self {
        self.input_overrides.extend(overrides);
        self
    }

    pub fn with_input_override(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.input_overrides.insert(name.into(), uri.into());
        self
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_output_kind(mut self, kind: impl Into<String>) -> Self {
        self.output_kind = kind.into();
        self
    }

    pub fn with_stream_chunk_size(mut self, size: usize) -> Self {
        self.stream_chunk_size = size;
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }
}

impl Runner for LocalRunner {
    fn name(&self) -> &str {
        "LocalRunner"
    }

    fn load_inputs(&self, pipeline: &Pipeline, ctx: &Context, loaded: &mut LoadedInputs) -> Result<(), RunError> {
        for (name, artifact) in &pipeline.inputs {
            let adapter = self.adapters.resolve(&artifact.kind)?;
            let source = self.input_overrides.get(name).unwrap_or(&artifact.uri);
            let paths = resolve_input_paths(name, source, &self.input_dir, adapter.file_extension())?;
            let payload = adapter.read_many(&paths, artifact, pipeline.execution_mode, Some(self.stream_chunk_size))?;
            ctx.emit_event("input.loaded",
                           attributes_from(json!({
                               "input_name": name,
                               "file_count": paths.len(),
                               "combine_strategy": artifact.combine_strategy.as_str(),
                               "artifact_kind": artifact.kind,
                               "execution_mode": pipeline.execution_mode.as_str(),
                           })));
            loaded.stats.insert(name.clone(),
                                InputStats { source: source.clone(),
                                             files_read: paths.len(),
                                             kind: artifact.kind.clone() });
            loaded.namespace.insert(name.clone(), payload);
        }
        Ok(())
    }

    fn write_outputs(&self,
                     pipeline: &Pipeline,
                     namespace: &Namespace,
                     ctx: &Context)
                     -> Result<IndexMap<String, OutputRecord>, RunError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| AdapterError::Io { path: self.output_dir.display().to_string(),
                                                                            message: e.to_string() })?;
        let mut persisted = IndexMap::new();
        for (name, dataset) in &pipeline.outputs {
            let data = namespace.get(&dataset.source)
                                .ok_or_else(|| RunError::UnknownOutput { output: name.clone(),
                                                                         source_name: dataset.source.clone() })?;
            let kind = dataset.kind.clone().unwrap_or_else(|| self.output_kind.clone());
            let adapter = self.adapters.resolve(&kind)?;
            let path = output_target_path(name, dataset.uri.as_deref(), &self.output_dir, adapter.file_extension());
            let mut target = Artifact::new(name.clone(), kind.clone(), path.display().to_string());
            target.metadata = dataset.metadata.clone();
            let rows = adapter.write(data, &path, Some(name), pipeline.execution_mode, Some(&target))?;
            ctx.emit_event("output.written",
                           attributes_from(json!({
                               "output_name": name,
                               "source_name": dataset.source,
                               "path": path.display().to_string(),
                               "artifact_kind": kind,
                               "execution_mode": pipeline.execution_mode.as_str(),
                           })));
            persisted.insert(name.clone(),
                             OutputRecord { path: path.display().to_string(),
                                            rows: Some(rows),
                                            kind,
                                            source: dataset.source.clone() });
        }
        Ok(persisted)
    }

    fn default_manifest_path(&self) -> PathBuf {
        self.manifest_path.clone().unwrap_or_else(|| self.output_dir.join(MANIFEST_FILE_NAME))
    }

    fn default_tracer(&self) -> Arc<dyn Tracer> {
        Arc::clone(&self.tracer)
    }
}
