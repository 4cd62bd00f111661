//! Registro `kind -> adapter`.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use trakt_core::suggest;

use crate::adapter::ArtifactAdapter;
use crate::csv_adapter::CsvAdapter;
use crate::errors::AdapterError;

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: IndexMap<String, Arc<dyn ArtifactAdapter>>,
}

fn normalize_kind(kind: &str) -> Result<String, AdapterError> {
    let normalized = kind.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(AdapterError::EmptyKind);
    }
    Ok(normalized)
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro con el adapter `csv`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.adapters.insert("csv".to_string(), Arc::new(CsvAdapter::new()));
        registry
    }

    pub fn register<A>(&mut self, kind: &str, adapter: A) -> Result<(), AdapterError>
        where A: ArtifactAdapter + 'static
    {
        let kind = normalize_kind(kind)?;
        log::debug!("adapter registrado para kind '{kind}'");
        self.adapters.insert(kind, Arc::new(adapter));
        Ok(())
    }

    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn ArtifactAdapter>, AdapterError> {
        let normalized = normalize_kind(kind)?;
        self.adapters
            .get(&normalized)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownKind { kind: kind.to_string(),
                                                       hint: suggest::hint(&normalized, self.kinds()) })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
         .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_normalized() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve(" CSV ").unwrap().file_extension(), ".csv");
    }

    #[test]
    fn empty_and_unknown_kinds_fail() {
        let mut registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve("  ").err().unwrap(), AdapterError::EmptyKind);
        assert_eq!(registry.register("", CsvAdapter::new()).unwrap_err(), AdapterError::EmptyKind);
        let err = registry.resolve("cvs").err().unwrap();
        assert!(err.to_string().starts_with("Unknown artifact kind: cvs"), "{err}");
    }
}
