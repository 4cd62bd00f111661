//! Plantilla de ejecución compartida por los runners.
//!
//! Un runner concreto sólo decide cómo se cargan los inputs y cómo se
//! escriben los outputs; validación, ejecución de steps, telemetría y
//! manifest son comunes. El manifest se escribe exactamente una vez por run,
//! también cuando el run falla.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{json, Value};
use trakt_core::telemetry::attributes_from;
use trakt_core::{materialize_outputs, resolve_binding, Attributes, Binding, Context, EventHook, ExecutionMode, Namespace,
                 Payload, Pipeline, SpanGuard, Step, StepError, StepInputs, Tracer};

use crate::error::RunError;
use crate::manifest::{write_manifest, ErrorInfo, InputStats, Manifest, OutputRecord, PipelineInfo, RunStatus, StepReport};

/// Opciones de un run.
#[derive(Default, Clone)]
pub struct RunOptions {
    pub run_id: Option<String>,
    pub pipeline_version: Option<String>,
    pub context_metadata: IndexMap<String, Value>,
    /// Tracer explícito; sin él se usa el del runner.
    pub tracer: Option<Arc<dyn Tracer>>,
    pub hooks: Vec<EventHook>,
    pub manifest_path: Option<PathBuf>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn pipeline_version(mut self, version: impl Into<String>) -> Self {
        self.pipeline_version = Some(version.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context_metadata.insert(key.into(), value.into());
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn hook(mut self, hook: EventHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }
}

/// Inputs cargados por un runner junto a sus estadísticas.
#[derive(Debug, Default)]
pub struct LoadedInputs {
    pub namespace: Namespace,
    pub stats: IndexMap<String, InputStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub run_id: String,
    pub pipeline: String,
    pub outputs: IndexMap<String, OutputRecord>,
    pub steps: Vec<StepReport>,
    pub status: RunStatus,
    pub manifest_path: PathBuf,
}

pub trait Runner {
    /// Nombre registrado en el manifest.
    fn name(&self) -> &str;

    /// Carga los inputs en `loaded`. Las estadísticas de cada input se
    /// registran al cargarlo, de modo que un fallo conserva las anteriores.
    fn load_inputs(&self, pipeline: &Pipeline, ctx: &Context, loaded: &mut LoadedInputs) -> Result<(), RunError>;

    fn write_outputs(&self,
                     pipeline: &Pipeline,
                     namespace: &Namespace,
                     ctx: &Context)
                     -> Result<IndexMap<String, OutputRecord>, RunError>;

    /// Ruta del manifest cuando `RunOptions` no la fija.
    fn default_manifest_path(&self) -> PathBuf;

    fn default_tracer(&self) -> Arc<dyn Tracer> {
        Arc::new(trakt_core::NoopTracer)
    }

    fn run(&self, pipeline: &Pipeline, options: RunOptions) -> Result<RunResult, RunError> {
        run_pipeline(self, pipeline, options)
    }
}

#[derive(Default)]
struct RunState {
    inputs: IndexMap<String, InputStats>,
    steps: Vec<StepReport>,
    outputs: IndexMap<String, OutputRecord>,
}

fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 1_000_000.0).round() / 1000.0
}

/// Ejecuta `pipeline` con `runner`. Ver la documentación del módulo.
pub fn run_pipeline<R>(runner: &R, pipeline: &Pipeline, options: RunOptions) -> Result<RunResult, RunError>
    where R: Runner + ?Sized
{
    pipeline.validate()?;

    let RunOptions { run_id,
                     pipeline_version,
                     context_metadata,
                     tracer,
                     hooks,
                     manifest_path } = options;
    let mut ctx = Context::new(run_id.unwrap_or_else(Context::generate_run_id), pipeline.name.clone())
        .with_version(pipeline_version)
        .with_metadata(context_metadata);
    for hook in hooks {
        ctx.add_hook(hook);
    }
    let tracer = tracer.unwrap_or_else(|| runner.default_tracer());

    let pipeline_span = SpanGuard::new(tracer.start_span("pipeline.run",
                                                         attributes_from(json!({
                                                             "pipeline.name": pipeline.name,
                                                             "pipeline.version": ctx.pipeline_version.clone().unwrap_or_default(),
                                                             "pipeline.execution_mode": pipeline.execution_mode.as_str(),
                                                             "run.id": ctx.run_id,
                                                         }))));
    ctx.enter_span(Arc::clone(pipeline_span.span()));

    let started_at = Utc::now();
    let started = Instant::now();
    log::info!("run {} del pipeline '{}' ({} mode)", ctx.run_id, pipeline.name, pipeline.execution_mode);
    ctx.emit_event("pipeline.started", Attributes::new());

    let mut state = RunState::default();
    let outcome = execute(runner, pipeline, &ctx, tracer.as_ref(), &mut state);

    let error = match &outcome {
        Ok(()) => {
            pipeline_span.set_attribute("status", json!("success"));
            None
        }
        Err(err) => {
            let info = ErrorInfo::from(err);
            ctx.emit_event("pipeline.failed",
                           attributes_from(json!({ "error_type": info.error_type, "error_message": info.message })));
            pipeline_span.set_attribute("status", json!("failed"));
            pipeline_span.set_attribute("error.type", json!(info.error_type));
            pipeline_span.set_attribute("error.message", json!(info.message));
            Some(info)
        }
    };

    let duration_ms = elapsed_ms(started);
    pipeline_span.set_attribute("duration.ms", json!(duration_ms));
    let manifest = Manifest { run_id: ctx.run_id.clone(),
                              status: if error.is_some() { RunStatus::Failed } else { RunStatus::Success },
                              pipeline: PipelineInfo { name: pipeline.name.clone(),
                                                       version: ctx.pipeline_version.clone(),
                                                       definition_hash: pipeline.definition_hash() },
                              runner: runner.name().to_string(),
                              started_at: started_at.to_rfc3339(),
                              finished_at: Utc::now().to_rfc3339(),
                              duration_ms,
                              inputs: state.inputs,
                              steps: state.steps,
                              outputs: state.outputs,
                              error };
    let manifest_path = manifest_path.unwrap_or_else(|| runner.default_manifest_path());
    let written = write_manifest(&manifest_path, &manifest);
    ctx.exit_span();

    match (outcome, written) {
        (Err(err), Err(manifest_err)) => {
            log::warn!("manifest no escrito tras fallo del run: {manifest_err}");
            Err(err)
        }
        (Err(err), Ok(())) => {
            log::info!("run {} falló: {}", ctx.run_id, err);
            Err(err)
        }
        (Ok(()), Err(manifest_err)) => Err(manifest_err),
        (Ok(()), Ok(())) => {
            log::info!("run {} completado en {duration_ms} ms", ctx.run_id);
            Ok(RunResult { run_id: manifest.run_id,
                           pipeline: pipeline.name.clone(),
                           outputs: manifest.outputs,
                           steps: manifest.steps,
                           status: RunStatus::Success,
                           manifest_path })
        }
    }
}

fn execute<R>(runner: &R, pipeline: &Pipeline, ctx: &Context, tracer: &dyn Tracer, state: &mut RunState) -> Result<(), RunError>
    where R: Runner + ?Sized
{
    let mut loaded = LoadedInputs::default();
    let loading = runner.load_inputs(pipeline, ctx, &mut loaded);
    let LoadedInputs { mut namespace, stats } = loaded;
    state.inputs = stats;
    loading?;

    for step in &pipeline.steps {
        let report = execute_step(step, pipeline.execution_mode, &mut namespace, ctx, tracer)?;
        state.steps.push(report);
    }

    state.outputs = runner.write_outputs(pipeline, &namespace, ctx)?;
    ctx.emit_event("pipeline.completed",
                   attributes_from(json!({ "output_count": state.outputs.len() })));
    Ok(())
}

fn literal_value(binding: &Binding) -> Value {
    match binding {
        Binding::Const(v) | Binding::Literal(v) => v.clone(),
        other => other.to_json(),
    }
}

fn count_rows<'a, I>(payloads: I) -> Option<usize>
    where I: IntoIterator<Item = &'a Payload>
{
    let counts: Vec<usize> = payloads.into_iter().filter_map(Payload::row_count).collect();
    if counts.is_empty() {
        None
    } else {
        Some(counts.into_iter().sum())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload.downcast_ref::<&str>()
           .map(|s| s.to_string())
           .or_else(|| payload.downcast_ref::<String>().cloned())
           .unwrap_or_else(|| "step panicked".to_string())
}

fn resolve_step_inputs(step: &Step, namespace: &Namespace) -> Result<StepInputs, RunError> {
    let mut values = IndexMap::new();
    for name in step.input_names() {
        if let Some(binding) = step.bindings.get(name) {
            values.insert(name.clone(), resolve_binding(binding, namespace, &step.id)?);
        }
    }
    for (name, binding) in step.extra_bindings() {
        values.insert(name.clone(), Payload::Value(literal_value(binding)));
    }
    Ok(StepInputs::new(values))
}

/// Ejecuta un step y publica sus outputs en el namespace.
pub fn execute_step(step: &Step,
                    mode: ExecutionMode,
                    namespace: &mut Namespace,
                    ctx: &Context,
                    tracer: &dyn Tracer)
                    -> Result<StepReport, RunError> {
    let inputs = resolve_step_inputs(step, namespace)?;
    let rows_in = count_rows(inputs.names().filter_map(|n| inputs.get(n)));
    let streamed_input = inputs.names().filter_map(|n| inputs.get(n)).any(Payload::is_stream);

    let span = SpanGuard::new(tracer.start_span(&format!("step.{}", step.id),
                                                attributes_from(json!({
                                                    "pipeline.name": ctx.pipeline_name,
                                                    "pipeline.version": ctx.pipeline_version.clone().unwrap_or_default(),
                                                    "step.id": step.id,
                                                }))));
    ctx.enter_span(Arc::clone(span.span()));
    let result = run_handler(step, mode, streamed_input, rows_in, inputs, namespace, ctx, &span);
    ctx.exit_span();
    if let Err(err) = &result {
        span.set_attribute("status", json!("failed"));
        span.set_attribute("error.type", json!(err.type_name()));
        span.set_attribute("error.message", json!(err.message()));
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn run_handler(step: &Step,
               mode: ExecutionMode,
               streamed_input: bool,
               rows_in: Option<usize>,
               inputs: StepInputs,
               namespace: &mut Namespace,
               ctx: &Context,
               span: &SpanGuard)
               -> Result<StepReport, RunError> {
    ctx.emit_event("step.started", attributes_from(json!({ "step_id": step.id, "rows_in": rows_in })));
    log::debug!("step '{}' ({}) iniciado", step.id, step.uses);

    let started = Instant::now();
    let handler = Arc::clone(step.handler());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.run(ctx, inputs)));
    let duration_ms = elapsed_ms(started);
    let output = match outcome {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(RunError::Step { step_id: step.id.clone(),
                                                       source }),
        Err(payload) => {
            return Err(RunError::Step { step_id: step.id.clone(),
                                        source: StepError::new("panic", panic_message(payload)) })
        }
    };

    if mode == ExecutionMode::Stream && streamed_input && output.data.values().any(|p| matches!(p, Payload::Table(_))) {
        ctx.emit_event("warning.stream_materialized",
                       attributes_from(json!({ "step_id": step.id })));
    }

    let metrics = output.metrics.clone();
    let produced = materialize_outputs(step, output)?;
    let rows_out = count_rows(produced.values());
    let outputs: Vec<String> = produced.keys().cloned().collect();
    namespace.extend(produced);

    if let Some(rows) = rows_in {
        span.set_attribute("rows.in", json!(rows));
    }
    if let Some(rows) = rows_out {
        span.set_attribute("rows.out", json!(rows));
    }
    span.set_attribute("duration.ms", json!(duration_ms));
    for (key, value) in &metrics {
        if value.is_number() || value.is_boolean() {
            span.set_attribute(&format!("metric.{key}"), value.clone());
        }
    }

    ctx.emit_event("step.completed",
                   attributes_from(json!({
                       "step_id": step.id,
                       "duration_ms": duration_ms,
                       "rows_in": rows_in,
                       "rows_out": rows_out,
                       "metrics": metrics,
                   })));
    log::debug!("step '{}' completado: rows_in={:?} rows_out={:?}", step.id, rows_in, rows_out);
    Ok(StepReport::new(step.id.clone(), rows_in, rows_out, duration_ms, outputs, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::InMemoryTracer;
    use std::sync::Mutex;
    use trakt_core::{FnStep, StepOutput, Table};

    /// Runner en memoria: inputs fijos, outputs retenidos.
    struct MemoryRunner {
        inputs: Namespace,
        manifest: PathBuf,
        written: Mutex<Vec<String>>,
    }

    impl Runner for MemoryRunner {
        fn name(&self) -> &str {
            "MemoryRunner"
        }

        fn load_inputs(&self, _pipeline: &Pipeline, _ctx: &Context, loaded: &mut LoadedInputs) -> Result<(), RunError> {
            loaded.namespace = self.inputs.clone();
            Ok(())
        }

        fn write_outputs(&self,
                         pipeline: &Pipeline,
                         namespace: &Namespace,
                         _ctx: &Context)
                         -> Result<IndexMap<String, OutputRecord>, RunError> {
            let mut out = IndexMap::new();
            for (name, dataset) in &pipeline.outputs {
                self.written.lock().unwrap().push(name.clone());
                out.insert(name.clone(),
                           OutputRecord { path: format!("mem://{name}"),
                                          rows: namespace.get(&dataset.source).and_then(Payload::row_count),
                                          kind: "memory".into(),
                                          source: dataset.source.clone() });
            }
            Ok(out)
        }

        fn default_manifest_path(&self) -> PathBuf {
            self.manifest.clone()
        }
    }

    fn runner(dir: &std::path::Path) -> MemoryRunner {
        let mut inputs = Namespace::new();
        inputs.insert("raw".into(),
                      Table::from_records(&[json!({"id": 1}), json!({"id": 2})]).unwrap().into());
        MemoryRunner { inputs,
                       manifest: dir.join("manifest.json"),
                       written: Mutex::new(Vec::new()) }
    }

    fn pipeline<F>(f: F) -> Pipeline
        where F: Fn(&Context, StepInputs) -> Result<StepOutput, StepError> + Send + Sync + 'static
    {
        let step = Step::from_handler("work",
                                      "work",
                                      Arc::new(FnStep::new(&["input"], &["output"], f)),
                                      [("input".to_string(), Binding::from("raw")),
                                       ("output".to_string(), Binding::from("done"))].into_iter()
                                                                                       .collect(),
                                      true).unwrap();
        Pipeline::new("p").add_input(trakt_core::Artifact::csv("raw", "raw.csv"))
                          .add_step(step)
                          .add_output(trakt_core::OutputDataset::new("final", "done"))
    }

    #[test]
    fn success_reports_rows_metrics_and_spans() {
        let tmp = tempfile::tempdir().unwrap();
        let tracer = InMemoryTracer::new();
        let p = pipeline(|_ctx: &Context, inputs: StepInputs| {
            Ok(StepOutput::single("output", inputs.table("input")?).with_metric("checked", 2))
        });
        let result = runner(tmp.path()).run(&p, RunOptions::new().run_id("r1").tracer(Arc::new(tracer.clone())))
                                       .unwrap();
        assert_eq!(result.run_id, "r1");
        assert_eq!(result.steps[0].rows_in, Some(2));
        assert_eq!(result.steps[0].rows_out, Some(2));
        assert_eq!(result.outputs["final"].rows, Some(2));

        let step_span = tracer.span("step.work").unwrap();
        assert!(step_span.ended);
        assert_eq!(step_span.attributes["metric.checked"], json!(2));
        assert_eq!(tracer.span("pipeline.run").unwrap().attributes["status"], json!("success"));
    }

    #[test]
    fn panics_become_step_failures_and_manifest_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let r = runner(tmp.path());
        let p = pipeline(|_ctx: &Context, _inputs: StepInputs| -> Result<StepOutput, StepError> { panic!("kaboom") });
        let err = r.run(&p, RunOptions::new()).unwrap_err();
        assert_eq!(err.type_name(), "panic");
        assert!(err.to_string().contains("kaboom"));
        assert!(r.written.lock().unwrap().is_empty());

        let manifest: Value = serde_json::from_str(&std::fs::read_to_string(tmp.path().join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["status"], json!("failed"));
        assert_eq!(manifest["error"]["type"], json!("panic"));
    }

    #[test]
    fn manifest_failure_after_step_failure_keeps_original_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let p = pipeline(|_ctx: &Context, _inputs: StepInputs| Err(StepError::new("ValueError", "bad")));
        let err = runner(tmp.path()).run(&p, RunOptions::new().manifest_path(blocker.join("manifest.json")))
                                    .unwrap_err();
        assert_eq!(err.type_name(), "ValueError");
    }

    #[test]
    fn failed_step_marks_its_span_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let tracer = InMemoryTracer::new();
        let p = pipeline(|_ctx: &Context, _inputs: StepInputs| Err(StepError::new("ValueError", "bad amount")));
        runner(tmp.path()).run(&p, RunOptions::new().tracer(Arc::new(tracer.clone()))).unwrap_err();

        let step_span = tracer.span("step.work").unwrap();
        assert!(step_span.ended);
        assert_eq!(step_span.attributes["status"], json!("failed"));
        assert_eq!(step_span.attributes["error.type"], json!("ValueError"));
        assert_eq!(step_span.attributes["error.message"], json!("bad amount"));
        assert_eq!(tracer.span("pipeline.run").unwrap().attributes["status"], json!("failed"));
    }

    #[test]
    fn manifest_failure_on_success_is_the_run_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let p = pipeline(|_ctx: &Context, inputs: StepInputs| Ok(StepOutput::single("output", inputs.table("input")?)));
        let err = runner(tmp.path()).run(&p, RunOptions::new().manifest_path(blocker.join("manifest.json")))
                                    .unwrap_err();
        assert_eq!(err.type_name(), "ManifestError");
    }

    #[test]
    fn hooks_receive_lifecycle_events() {
        let tmp = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let p = pipeline(|_ctx: &Context, inputs: StepInputs| Ok(StepOutput::single("output", inputs.table("input")?)));
        runner(tmp.path()).run(&p,
                               RunOptions::new().hook(Arc::new(move |name: &str, _attrs: &Attributes| {
                                                    sink.lock().unwrap().push(name.to_string())
                                                })))
                          .unwrap();
        assert_eq!(*seen.lock().unwrap(),
                   vec!["pipeline.started", "step.started", "step.completed", "pipeline.completed"]);
    }
}
