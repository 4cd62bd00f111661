use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use crate::telemetry::{is_diagnostic_event, Attributes, Span};

/// Hook invocado con cada evento emitido durante un run.
pub type EventHook = Arc<dyn Fn(&str, &Attributes) + Send + Sync>;

/// Contexto de un run, compartido por todos los steps.
pub struct Context {
    pub run_id: String,
    pub pipeline_name: String,
    pub pipeline_version: Option<String>,
    pub started_at: DateTime<Utc>,
    pub metadata: IndexMap<String, Value>,
    hooks: Vec<EventHook>,
    spans: RefCell<Vec<Arc<dyn Span>>>,
}

impl Context {
    pub fn new(run_id: impl Into<String>, pipeline_name: impl Into<String>) -> Self {
        Self { run_id: run_id.into(),
               pipeline_name: pipeline_name.into(),
               pipeline_version: None,
               started_at: Utc::now(),
               metadata: IndexMap::new(),
               hooks: Vec::new(),
               spans: RefCell::new(Vec::new()) }
    }

    /// Run id aleatorio (uuid v4 sin guiones).
    pub fn generate_run_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.pipeline_version = version;
        self
    }

    pub fn with_metadata(mut self, metadata: IndexMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn add_hook(&mut self, hook: EventHook) {
        self.hooks.push(hook);
    }

    /// Emite un evento: todos los hooks lo reciben y, si es diagnóstico, se
    /// adjunta también al span activo más interno.
    pub fn emit_event(&self, name: &str, attributes: Attributes) {
        log::debug!("[{}] event {} {:?}", self.run_id, name, attributes);
        if is_diagnostic_event(name) {
            if let Some(span) = self.active_span() {
                span.add_event(name, &attributes);
            }
        }
        for hook in &self.hooks {
            hook(name, &attributes);
        }
    }

    pub fn enter_span(&self, span: Arc<dyn Span>) {
        self.spans.borrow_mut().push(span);
    }

    pub fn exit_span(&self) -> Option<Arc<dyn Span>> {
        self.spans.borrow_mut().pop()
    }

    pub fn active_span(&self) -> Option<Arc<dyn Span>> {
        self.spans.borrow().last().cloned()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
         .field("run_id", &self.run_id)
         .field("pipeline_name", &self.pipeline_name)
         .field("pipeline_version", &self.pipeline_version)
         .field("started_at", &self.started_at)
         .field("hooks", &self.hooks.len())
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::attributes_from;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingSpan {
        events: Mutex<Vec<String>>,
    }

    impl Span for RecordingSpan {
        fn name(&self) -> &str {
            "test"
        }
        fn set_attribute(&self, _key: &str, _value: Value) {}
        fn add_event(&self, name: &str, _attributes: &Attributes) {
            self.events.lock().unwrap().push(name.to_string());
        }
        fn end(&self) {}
    }

    #[test]
    fn diagnostics_reach_active_span_and_all_events_reach_hooks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ctx = Context::new("r1", "p");
        ctx.add_hook(Arc::new(move |name: &str, _attrs: &Attributes| sink.lock().unwrap().push(name.to_string())));

        let span = Arc::new(RecordingSpan { events: Mutex::new(Vec::new()) });
        ctx.enter_span(span.clone());
        ctx.emit_event("warning.rename_optional_missing", attributes_from(json!({"column": "x"})));
        ctx.emit_event("step.started", Attributes::new());
        ctx.exit_span();

        assert_eq!(*span.events.lock().unwrap(), vec!["warning.rename_optional_missing".to_string()]);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
