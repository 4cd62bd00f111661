//! Modelo de datos: artifacts, tablas, payloads, schema y contexto de run.

pub mod artifact;
pub mod context;
pub mod payload;
pub mod schema;
pub mod table;

pub use artifact::{Artifact, CombineStrategy, ExecutionMode, OutputDataset};
pub use context::{Context, EventHook};
pub use payload::{ChunkIter, Payload, TableStream};
pub use schema::ArtifactSchema;
pub use table::{ColumnType, Table};
