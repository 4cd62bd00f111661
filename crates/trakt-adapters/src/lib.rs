//! trakt-adapters: lectura y escritura de artifacts por `kind`.
//!
//! El runner sólo conoce el contrato `ArtifactAdapter` y un
//! `AdapterRegistry`; el adapter CSV incluido cubre batch y stream por
//! chunks. La resolución de rutas de input (globs, directorios, listas
//! separadas por coma) vive en `paths`.

pub mod adapter;
pub mod csv_adapter;
pub mod errors;
pub mod paths;
pub mod registry;

pub use adapter::ArtifactAdapter;
pub use csv_adapter::{CsvAdapter, CsvOptions};
pub use errors::AdapterError;
pub use paths::{output_target_path, resolve_input_paths};
pub use registry::AdapterRegistry;
