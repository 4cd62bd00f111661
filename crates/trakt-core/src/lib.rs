//! trakt-core: modelo, bindings, validación y definición de pipelines.
//!
//! Este crate no ejecuta nada por sí mismo: define qué es un pipeline, cómo
//! se cablean sus steps y cuándo esa definición es válida. La ejecución vive
//! en `trakt-runtime`.
pub mod binding;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod loader;
pub mod model;
pub mod overrides;
pub mod pipeline;
pub mod registry;
pub mod step;
pub mod suggest;
pub mod telemetry;
pub mod workflow;

pub use binding::{materialize_outputs, resolve_binding, Binding, Namespace};
pub use errors::{BindingError, DataError, DefinitionError, PipelineValidationError, RegistryError, SchemaError, StepError};
pub use loader::{load_pipeline, load_pipeline_with, parse_pipeline, LoadOptions};
pub use model::{Artifact, ArtifactSchema, ChunkIter, ColumnType, CombineStrategy, Context, EventHook, ExecutionMode, OutputDataset, Payload, Table, TableStream};
pub use overrides::{apply_const_overrides, apply_input_overrides, parse_input_overrides, parse_param_overrides, ParamOverride};
pub use pipeline::Pipeline;
pub use registry::StepRegistry;
pub use step::{Capabilities, FnStep, Step, StepHandler, StepInputs, StepOutput};
pub use telemetry::{Attributes, NoopTracer, Span, SpanGuard, Tracer};
pub use workflow::{WorkflowBuilder, WorkflowStep};
