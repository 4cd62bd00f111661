//! Contrato de telemetría.
//!
//! El core sólo define spans y tracers; el backend concreto vive fuera (ver
//! `trakt-runtime::telemetry`). Los spans usan mutabilidad interior para poder
//! compartirse entre el runner y el `Context`.
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::constants::DIAGNOSTIC_MARKERS;

/// Atributos de spans y eventos.
pub type Attributes = IndexMap<String, Value>;

pub trait Span: Send + Sync {
    fn name(&self) -> &str;
    fn set_attribute(&self, key: &str, value: Value);
    fn add_event(&self, name: &str, attributes: &Attributes);
    fn end(&self);
}

pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str, attributes: Attributes) -> Arc<dyn Span>;
}

/// Tracer usado cuando la telemetría está deshabilitada.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

struct NoopSpan {
    name: String,
}

impl Span for NoopSpan {
    fn name(&self) -> &str {
        &self.name
    }
    fn set_attribute(&self, _key: &str, _value: Value) {}
    fn add_event(&self, _name: &str, _attributes: &Attributes) {}
    fn end(&self) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, name: &str, _attributes: Attributes) -> Arc<dyn Span> {
        Arc::new(NoopSpan { name: name.to_string() })
    }
}

/// Cierra el span al salir de scope, también ante errores o panics.
pub struct SpanGuard {
    span: Arc<dyn Span>,
}

impl SpanGuard {
    pub fn new(span: Arc<dyn Span>) -> Self {
        Self { span }
    }

    pub fn span(&self) -> &Arc<dyn Span> {
        &self.span
    }
}

impl std::ops::Deref for SpanGuard {
    type Target = dyn Span;

    fn deref(&self) -> &Self::Target {
        self.span.as_ref()
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.span.end();
    }
}

/// Un evento es diagnóstico si su nombre (minúsculas, `-` como `_`) contiene
/// `warning`, `coercion` o `missing_column`.
pub fn is_diagnostic_event(name: &str) -> bool {
    let norm = name.to_ascii_lowercase().replace('-', "_");
    DIAGNOSTIC_MARKERS.iter().any(|m| norm.contains(m))
}

/// Convierte un objeto JSON en atributos; cualquier otro valor queda vacío.
pub fn attributes_from(value: Value) -> Attributes {
    match value {
        Value::Object(obj) => obj.into_iter().collect(),
        _ => Attributes::new(),
    }
}
