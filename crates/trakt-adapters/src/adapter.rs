//! Contrato de adapters de artifacts.
use std::path::{Path, PathBuf};

use trakt_core::{Artifact, ExecutionMode, Payload};

use crate::errors::AdapterError;

/// Lee y escribe un `kind` concreto de artifact.
pub trait ArtifactAdapter: Send + Sync {
    /// Extensión con punto (`.csv`); vacía si el adapter no filtra archivos.
    fn file_extension(&self) -> &str;

    /// Materializa uno o más archivos. En modo stream devuelve un
    /// `Payload::Stream` perezoso de chunks de `chunk_size` filas.
    fn read_many(&self,
                 paths: &[PathBuf],
                 artifact: &Artifact,
                 mode: ExecutionMode,
                 chunk_size: Option<usize>)
                 -> Result<Payload, AdapterError>;

    /// Persiste `data` en `path` y devuelve las filas escritas.
    fn write(&self,
             data: &Payload,
             path: &Path,
             artifact_name: Option<&str>,
             mode: ExecutionMode,
             artifact: Option<&Artifact>)
             -> Result<usize, AdapterError>;
}
