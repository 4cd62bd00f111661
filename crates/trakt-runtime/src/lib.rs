//! trakt-runtime: ejecución de pipelines.
//!
//! `Runner` es la plantilla (validación, steps, telemetría, manifest);
//! `LocalRunner` la implementa sobre el filesystem. La configuración por
//! entorno vive en `config` y los tracers concretos en `telemetry`.

pub mod config;
pub mod error;
pub mod local;
pub mod manifest;
pub mod runner;
pub mod telemetry;

pub use config::{init_dotenv, RunnerConfig};
pub use error::RunError;
pub use local::LocalRunner;
pub use manifest::{read_manifest, write_manifest, ErrorInfo, InputStats, Manifest, OutputRecord, PipelineInfo, RunStatus, StepReport};
pub use runner::{execute_step, run_pipeline, LoadedInputs, RunOptions, RunResult, Runner};
pub use telemetry::{get_tracer, InMemoryTracer, LogTracer, SpanRecord};
