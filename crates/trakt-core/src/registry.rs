//! Registro de steps: alias -> fábrica de handlers.
//!
//! El descubrimiento dinámico de implementaciones externas queda fuera del
//! core; quien embebe el motor registra sus handlers explícitamente.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::RegistryError;
use crate::step::StepHandler;
use crate::suggest;

pub type StepFactory = Arc<dyn Fn() -> Arc<dyn StepHandler> + Send + Sync>;

#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: IndexMap<String, StepFactory>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra (o reemplaza) una fábrica bajo `alias`.
    pub fn register<F, H>(&mut self, alias: impl Into<String>, factory: F)
        where F: Fn() -> H + Send + Sync + 'static,
              H: StepHandler + 'static
    {
        let factory: StepFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn StepHandler>);
        self.factories.insert(alias.into(), factory);
    }

    /// Registra una instancia compartida.
    pub fn register_handler(&mut self, alias: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.factories.insert(alias.into(), Arc::new(move || Arc::clone(&handler)));
    }

    pub fn resolve(&self, alias: &str) -> Result<Arc<dyn StepHandler>, RegistryError> {
        match self.factories.get(alias) {
            Some(factory) => Ok(factory()),
            None => Err(RegistryError::UnknownAlias { alias: alias.to_string(),
                                                      hint: suggest::hint(alias, self.aliases()) }),
        }
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.factories.contains_key(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
         .field("aliases", &self.factories.keys().collect::<Vec<_>>())
         .finish()
    }
}
