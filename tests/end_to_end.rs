use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use thiserror::Error;
use trakt::prelude::*;
use trakt::trakt_core::{parse_param_overrides, parse_pipeline};
use trakt::trakt_runtime::RunError;

#[derive(Debug, Error)]
#[error("amount column is not numeric")]
struct AmountError;

fn doubling() -> FnStep<impl Fn(&Context, StepInputs) -> Result<StepOutput, StepError> + Send + Sync> {
    FnStep::new(&["input"], &["output"], |_ctx: &Context, inputs: StepInputs| {
        let table = inputs.table("input")?;
        let doubled = table.map_column("amount", |v| v.as_i64().map(|n| json!(n * 2)).unwrap_or(Value::Null))?;
        Ok(StepOutput::single("output", doubled))
    })
}

fn failing() -> FnStep<impl Fn(&Context, StepInputs) -> Result<StepOutput, StepError> + Send + Sync> {
    FnStep::new(&["input"], &["output"], |_ctx: &Context, _inputs: StepInputs| Err(StepError::from_error(&AmountError)))
}

fn registry() -> StepRegistry {
    let mut registry = default_registry();
    registry.register("double", doubling);
    registry.register("fail", failing);
    registry
}

fn write_parts(dir: &Path) {
    fs::create_dir_all(dir.join("parts")).unwrap();
    fs::write(dir.join("parts/part-1.csv"), "id,amount\n1,10\n").unwrap();
    fs::write(dir.join("parts/part-2.csv"), "id,amount\n2,30\n").unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

const DOUBLE_YAML: &str = r#"
name: doubling
inputs:
  raw:
    uri: parts/*.csv
    combine_strategy: concat
steps:
  - id: double
    uses: double
    with: {input: raw, output: doubled}
outputs:
  final: doubled
"#;

#[test]
fn concat_inputs_flow_through_a_step_into_outputs_and_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    write_parts(tmp.path());
    let out = tmp.path().join("out");

    let pipeline = parse_pipeline(DOUBLE_YAML, "doubling", &registry(), LoadOptions::default()).unwrap();
    let result = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new().pipeline_version("1.0"))
                                                   .unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(fs::read_to_string(out.join("final.csv")).unwrap(), "id,amount\n1,20\n2,60\n");

    let manifest = read_json(&out.join("manifest.json"));
    assert_eq!(manifest["status"], json!("success"));
    assert_eq!(manifest["outputs"]["final"]["rows"], json!(2));
    assert_eq!(manifest["pipeline"]["version"], json!("1.0"));
    assert_eq!(manifest["pipeline"]["definition_hash"], json!(pipeline.definition_hash()));
    assert_eq!(manifest["runner"], json!("LocalRunner"));
    assert_eq!(manifest["inputs"]["raw"]["files_read"], json!(2));
    assert_eq!(manifest["steps"][0]["rows_in"], json!(2));
    assert_eq!(manifest["error"], Value::Null);
    assert_eq!(result.manifest_path, out.join("manifest.json"));
}

#[test]
fn failing_step_writes_failed_manifest_and_propagates() {
    let tmp = tempfile::tempdir().unwrap();
    write_parts(tmp.path());
    let out = tmp.path().join("out");
    let yaml = DOUBLE_YAML.replace("uses: double", "uses: fail");

    let pipeline = parse_pipeline(&yaml, "doubling", &registry(), LoadOptions::default()).unwrap();
    let err = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new()).unwrap_err();
    assert!(matches!(err, RunError::Step { ref step_id, .. } if step_id == "double"));
    assert_eq!(err.type_name(), "AmountError");

    let manifest = read_json(&out.join("manifest.json"));
    assert_eq!(manifest["status"], json!("failed"));
    assert_eq!(manifest["error"]["type"], json!("AmountError"));
    assert_eq!(manifest["error"]["message"], json!("amount column is not numeric"));
    assert_eq!(manifest["outputs"], json!({}));
    assert!(!out.join("final.csv").exists());
}

#[test]
fn stream_mode_rejects_non_concat_csv_inputs_before_running() {
    let tmp = tempfile::tempdir().unwrap();
    write_parts(tmp.path());
    let out = tmp.path().join("out");
    let yaml = DOUBLE_YAML.replace("name: doubling", "name: doubling\nexecution_mode: stream")
                          .replace("combine_strategy: concat", "combine_strategy: union_by_name");

    let pipeline = parse_pipeline(&yaml, "doubling", &registry(), LoadOptions::default()).unwrap();
    let err = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new()).unwrap_err();
    match err {
        RunError::Validation(v) => {
            assert_eq!(v.stream_combine_violations, vec![("raw".to_string(), CombineStrategy::UnionByName)]);
            assert_eq!(v.incompatible_steps.len(), 1);
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(!out.join("manifest.json").exists());
}

#[test]
fn quality_gate_warn_keeps_rows_and_fail_stops_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("raw.csv"), "id,v\n1,a\n1,b\n2,c\n").unwrap();
    let yaml = |mode: &str| {
        format!(r#"
name: gates
inputs:
  raw: raw.csv
steps:
  - id: gate
    uses: quality_gate
    with:
      input: raw
      output: checked
      policy: {{const: {{mode: {mode}, required_columns: [id, missing], unique_keys: [id]}}}}
outputs:
  final: checked
"#)
    };

    let out = tmp.path().join("warn");
    let pipeline = parse_pipeline(&yaml("warn"), "gates", &registry(), LoadOptions::default()).unwrap();
    let result = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new()).unwrap();
    assert_eq!(result.outputs["final"].rows, Some(3));
    let violations = result.steps[0].metrics["quality_violations"].as_u64().unwrap();
    assert!(violations >= 2);

    let out = tmp.path().join("fail");
    let pipeline = parse_pipeline(&yaml("fail"), "gates", &registry(), LoadOptions::default()).unwrap();
    let err = LocalRunner::new(tmp.path(), &out).run(&pipeline, RunOptions::new()).unwrap_err();
    assert_eq!(err.type_name(), "PolicyError");
    assert_eq!(read_json(&out.join("manifest.json"))["error"]["type"], json!("PolicyError"));
}

#[test]
fn pipeline_files_run_with_param_overrides() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("orders");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("orders.csv"), "id,updated_at,status\n1,1,new\n1,2,paid\n2,1,new\n").unwrap();
    let pipeline_file = project.join("pipeline.yaml");
    fs::write(&pipeline_file,
              r#"
inputs:
  orders: orders.csv
steps:
  - id: latest
    uses: dedupe
    with:
      input: orders
      policy: {const: {keys: id, winner: latest, order_by: updated_at}}
      output: current
outputs:
  datasets:
    - name: current_orders
      from: current
      uri: current/orders.csv
"#).unwrap();

    let overrides = parse_param_overrides(&["latest.policy={keys: id, winner: earliest, order_by: updated_at}"]).unwrap();
    let out = tmp.path().join("out");
    let result = run_pipeline_file(&pipeline_file,
                                   &registry(),
                                   LoadOptions::default(),
                                   &overrides,
                                   &LocalRunner::new(&project, &out),
                                   RunOptions::new()).unwrap();

    assert_eq!(result.pipeline, "orders");
    assert_eq!(result.steps[0].rows_dropped, Some(json!(1)));
    assert_eq!(fs::read_to_string(out.join("current/orders.csv")).unwrap(),
               "id,updated_at,status\n1,1,new\n2,1,new\n");
}

#[test]
fn unknown_step_alias_is_a_definition_error() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("p.yaml");
    fs::write(&file, DOUBLE_YAML.replace("uses: double", "uses: doubel")).unwrap();
    let err = run_pipeline_file(&file,
                                &registry(),
                                LoadOptions::default(),
                                &[],
                                &LocalRunner::new(tmp.path(), tmp.path().join("out")),
                                RunOptions::new()).unwrap_err();
    assert_eq!(err.type_name(), "DefinitionError");
    assert!(err.to_string().contains("did you mean 'double'"), "{err}");
}
