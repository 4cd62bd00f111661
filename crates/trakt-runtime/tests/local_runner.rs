use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use trakt_core::{parse_pipeline, Context, FnStep, LoadOptions, StepError, StepInputs, StepOutput, StepRegistry};
use trakt_policies::register_builtins;
use trakt_runtime::{InMemoryTracer, LocalRunner, RunOptions, RunStatus, Runner};

fn registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    register_builtins(&mut registry);
    registry.register("passthrough", || {
                FnStep::new(&["input"], &["output"], |_ctx: &Context, mut inputs: StepInputs| {
                    let value = inputs.take("input").ok_or_else(|| StepError::msg("no input"))?;
                    Ok(StepOutput::single("output", value))
                }).with_capabilities(trakt_core::Capabilities::all())
            });
    registry.register("materialize", || {
                FnStep::new(&["input"], &["output"], |_ctx: &Context, inputs: StepInputs| {
                    Ok(StepOutput::single("output", inputs.table("input")?))
                }).with_capabilities(trakt_core::Capabilities::all())
            });
    registry
}

fn manifest(dir: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap()
}

#[test]
fn stream_pipeline_renames_chunks_and_writes_all_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let input_dir = tmp.path().join("in");
    let output_dir = tmp.path().join("out");
    fs::create_dir_all(&input_dir).unwrap();
    fs::write(input_dir.join("a.csv"), "id,amt\n1,10\n2,20\n3,30\n").unwrap();
    fs::write(input_dir.join("b.csv"), "id,amt\n4,40\n").unwrap();

    let yaml = r#"
name: stream_demo
execution:
  mode: stream
inputs:
  raw:
    uri: "*.csv"
steps:
  - id: rename
    uses: rename
    with:
      input: raw
      policy: {const: {mapping: {amt: amount}}}
      output: renamed
outputs:
  final: renamed
"#;
    let pipeline = parse_pipeline(yaml, "demo", &registry(), LoadOptions::default()).unwrap();
    let runner = LocalRunner::new(&input_dir, &output_dir).with_stream_chunk_size(2);
    let result = runner.run(&pipeline, RunOptions::new()).unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.outputs["final"].rows, Some(4));
    assert_eq!(result.steps[0].rows_in, None);
    let written = fs::read_to_string(output_dir.join("final.csv")).unwrap();
    assert_eq!(written, "id,amount\n1,10\n2,20\n3,30\n4,40\n");
    assert_eq!(manifest(&output_dir)["inputs"]["raw"]["files_read"], json!(2));
}

#[test]
fn materializing_a_stream_emits_a_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("raw.csv"), "id\n1\n").unwrap();
    let yaml = r#"
name: mat
execution_mode: stream
inputs:
  raw: raw.csv
steps:
  - id: collect
    uses: materialize
    with: {input: raw, output: table}
outputs:
  final: table
"#;
    let pipeline = parse_pipeline(yaml, "mat", &registry(), LoadOptions::default()).unwrap();
    let tracer = InMemoryTracer::new();
    LocalRunner::new(tmp.path(), tmp.path().join("out")).run(&pipeline, RunOptions::new().tracer(Arc::new(tracer.clone())))
                                                        .unwrap();
    let span = tracer.span("step.collect").unwrap();
    assert_eq!(span.events.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
               vec!["warning.stream_materialized"]);
}

#[test]
fn quality_gate_metrics_reach_manifest_and_span() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("raw.csv"), "id,v\n1,a\n1,\n2,c\n").unwrap();
    let yaml = r#"
name: gates
inputs:
  raw: raw.csv
steps:
  - id: gate
    uses: quality_gate
    with:
      input: raw
      output: checked
      policy:
        const:
          mode: warn
          required_columns: [id, score]
          unique_keys: [id]
outputs:
  final: checked
"#;
    let pipeline = parse_pipeline(yaml, "gates", &registry(), LoadOptions::default()).unwrap();
    let tracer = InMemoryTracer::new();
    let out = tmp.path().join("out");
    let result = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new().tracer(Arc::new(tracer.clone())))
                                                   .unwrap();
    assert_eq!(result.outputs["final"].rows, Some(3));
    assert_eq!(result.steps[0].metrics["quality_violations"], json!(2));

    let m = manifest(&out);
    assert_eq!(m["steps"][0]["metrics"]["quality_warnings"], json!(2));
    let span = tracer.span("step.gate").unwrap();
    assert_eq!(span.events.len(), 2);
    assert_eq!(span.attributes["metric.quality_checks"], json!(2));
}

#[test]
fn input_override_replaces_declared_uri() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("other.csv"), "id\n7\n").unwrap();
    let yaml = r#"
name: ov
inputs:
  raw: missing.csv
steps:
  - id: copy
    uses: passthrough
    with: {input: raw, output: copied}
outputs:
  final: copied
"#;
    let pipeline = parse_pipeline(yaml, "ov", &registry(), LoadOptions::default()).unwrap();
    let out = tmp.path().join("out");
    let result = LocalRunner::new(tmp.path(), &out).with_input_override("raw", "other.csv")
                                                   .run(&pipeline, RunOptions::new())
                                                   .unwrap();
    assert_eq!(result.outputs["final"].rows, Some(1));
    assert_eq!(manifest(&out)["inputs"]["raw"]["source"], json!("other.csv"));
}

#[test]
fn missing_input_files_fail_with_adapter_error_in_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let yaml = r#"
name: nofiles
inputs:
  raw: nothing/*.csv
steps:
  - id: copy
    uses: passthrough
    with: {input: raw, output: copied}
outputs:
  final: copied
"#;
    let pipeline = parse_pipeline(yaml, "nofiles", &registry(), LoadOptions::default()).unwrap();
    let out = tmp.path().join("out");
    let err = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new()).unwrap_err();
    assert_eq!(err.type_name(), "AdapterError");
    let m = manifest(&out);
    assert_eq!(m["status"], json!("failed"));
    assert_eq!(m["error"]["type"], json!("AdapterError"));
    assert_eq!(m["steps"], json!([]));
}

#[test]
fn inputs_loaded_before_a_failure_stay_in_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("orders.csv"), "id\n1\n2\n").unwrap();
    let yaml = r#"
name: partial
inputs:
  orders: orders.csv
  customers: customers/*.csv
steps:
  - id: copy_orders
    uses: passthrough
    with: {input: orders, output: orders_out}
  - id: copy_customers
    uses: passthrough
    with: {input: customers, output: customers_out}
outputs:
  orders_final: orders_out
  customers_final: customers_out
"#;
    let pipeline = parse_pipeline(yaml, "partial", &registry(), LoadOptions::default()).unwrap();
    let out = tmp.path().join("out");
    let err = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new()).unwrap_err();
    assert_eq!(err.type_name(), "AdapterError");

    let m = manifest(&out);
    assert_eq!(m["status"], json!("failed"));
    assert_eq!(m["inputs"]["orders"], json!({"source": "orders.csv", "files_read": 1, "kind": "csv"}));
    assert!(m["inputs"].get("customers").is_none());
}
