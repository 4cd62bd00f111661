use thiserror::Error;
use trakt_core::DefinitionError;
use trakt_runtime::RunError;

/// Cualquier fallo de `run_pipeline_file`: definición inválida o run fallido.
#[derive(Debug, Error)]
pub enum TraktError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl TraktError {
    /// Tipo de error tal como lo registraría un manifest.
    pub fn type_name(&self) -> String {
        match self {
            TraktError::Definition(_) => "DefinitionError".to_string(),
            TraktError::Run(err) => err.type_name(),
        }
    }
}
