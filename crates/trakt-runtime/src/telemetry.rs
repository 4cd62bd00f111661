//! Tracers concretos.
//!
//! `LogTracer` vuelca spans y eventos al facade `log`; `InMemoryTracer`
//! guarda todo en memoria para inspeccionarlo en tests.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde_json::Value;
use trakt_core::{Attributes, NoopTracer, Span, Tracer};

use crate::config::RunnerConfig;

/// Tracer según configuración: `LogTracer` si la telemetría está habilitada.
pub fn get_tracer(config: &RunnerConfig) -> Arc<dyn Tracer> {
    if config.telemetry_enabled {
        Arc::new(LogTracer::new(config.service_name.clone()))
    } else {
        Arc::new(NoopTracer)
    }
}

#[derive(Debug, Clone)]
pub struct LogTracer {
    service_name: String,
}

impl LogTracer {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }
}

struct LogSpan {
    service: String,
    name: String,
    started: Instant,
    ended: AtomicBool,
}

impl Span for LogSpan {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_attribute(&self, key: &str, value: Value) {
        log::debug!("[{}] span {} {}={}", self.service, self.name, key, value);
    }

    fn add_event(&self, name: &str, attributes: &Attributes) {
        log::warn!("[{}] span {} event {} {:?}", self.service, self.name, name, attributes);
    }

    fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            log::info!("[{}] span {} ended after {:?}", self.service, self.name, self.started.elapsed());
        }
    }
}

impl Tracer for LogTracer {
    fn start_span(&self, name: &str, attributes: Attributes) -> Arc<dyn Span> {
        log::info!("[{}] span {} started {:?}", self.service_name, name, attributes);
        Arc::new(LogSpan { service: self.service_name.clone(),
                           name: name.to_string(),
                           started: Instant::now(),
                           ended: AtomicBool::new(false) })
    }
}

/// Copia inmutable de un span registrado.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub name: String,
    pub attributes: Attributes,
    pub events: Vec<(String, Attributes)>,
    pub ended: bool,
}

#[derive(Debug)]
struct RecordingSpan {
    name: String,
    state: Mutex<SpanRecord>,
}

impl Span for RecordingSpan {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_attribute(&self, key: &str, value: Value) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.attributes.insert(key.to_string(), value);
    }

    fn add_event(&self, name: &str, attributes: &Attributes) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.events.push((name.to_string(), attributes.clone()));
    }

    fn end(&self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).ended = true;
    }
}

/// Tracer en memoria. Los clones comparten los spans registrados.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracer {
    spans: Arc<Mutex<Vec<Arc<RecordingSpan>>>>,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans en orden de apertura.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.state.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    pub fn span(&self, name: &str) -> Option<SpanRecord> {
        self.spans().into_iter().find(|s| s.name == name)
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, name: &str, attributes: Attributes) -> Arc<dyn Span> {
        let span = Arc::new(RecordingSpan { name: name.to_string(),
                                            state: Mutex::new(SpanRecord { name: name.to_string(),
                                                                           attributes,
                                                                           events: Vec::new(),
                                                                           ended: false }) });
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(&span));
        span
    }
}
