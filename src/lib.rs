//! trakt: motor declarativo de pipelines de datos.
//!
//! Fachada sobre los crates del workspace:
//! - `trakt_core`: modelo, bindings, validación, loader YAML y builder.
//! - `trakt_policies`: combine, schema, join, dedupe, rename y quality gates.
//! - `trakt_adapters`: lectura/escritura por kind (CSV incluido).
//! - `trakt_runtime`: plantilla de runner, `LocalRunner`, manifest y tracers.
//!
//! `run_pipeline_file` cubre el caso común: cargar un YAML, aplicar
//! overrides y ejecutarlo con un runner.

pub mod errors;

use std::path::Path;

pub use errors::TraktError;
pub use {trakt_adapters, trakt_core, trakt_policies, trakt_runtime};

use trakt_core::{apply_const_overrides, load_pipeline_with, LoadOptions, ParamOverride, StepRegistry};
use trakt_runtime::{RunOptions, RunResult, Runner};

/// Registry con los steps incorporados (`quality_gate`, `dedupe`, `rename`,
/// `join`).
pub fn default_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    trakt_policies::register_builtins(&mut registry);
    registry
}

/// Carga `path`, aplica `overrides` sobre bindings `const` y ejecuta.
pub fn run_pipeline_file<R>(path: &Path,
                            registry: &StepRegistry,
                            load: LoadOptions,
                            overrides: &[ParamOverride],
                            runner: &R,
                            options: RunOptions)
                            -> Result<RunResult, TraktError>
    where R: Runner + ?Sized
{
    let mut pipeline = load_pipeline_with(path, registry, load)?;
    apply_const_overrides(&mut pipeline, overrides)?;
    log::debug!("pipeline '{}' cargado desde {}", pipeline.name, path.display());
    Ok(runner.run(&pipeline, options)?)
}

pub mod prelude {
    pub use crate::{default_registry, run_pipeline_file, TraktError};
    pub use trakt_core::{Artifact, Binding, Capabilities, CombineStrategy, Context, ExecutionMode, FnStep, LoadOptions,
                         OutputDataset, Payload, Pipeline, StepError, StepHandler, StepInputs, StepOutput, StepRegistry,
                         Table, TableStream, WorkflowBuilder, WorkflowStep};
    pub use trakt_runtime::{LocalRunner, RunOptions, RunResult, RunStatus, Runner, RunnerConfig};
}
