//! Steps incorporados que envuelven las políticas.
//!
//! La política se liga como literal (`policy: {const: {...}}`); las métricas
//! de cada política viajan en `StepOutput::metrics` hasta el manifest.
use serde_json::{json, Value};
use trakt_core::{Capabilities, Context, Payload, StepError, StepHandler, StepInputs, StepOutput, StepRegistry};

use crate::dedupe::{apply_dedupe_policy, DedupePolicy};
use crate::errors::PolicyError;
use crate::join::{apply_join_policy, JoinPolicy};
use crate::quality::{evaluate_quality_gates, QualityGatePolicy};
use crate::rename::{apply_rename_policy, RenamePolicy};

fn policy_err(err: PolicyError) -> StepError {
    StepError::from_error(&err)
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn policy_value(inputs: &StepInputs) -> Result<Value, StepError> {
    match inputs.get("policy") {
        None => Ok(Value::Null),
        Some(_) => inputs.value("policy"),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QualityGateStep;

impl StepHandler for QualityGateStep {
    fn declared_inputs(&self) -> Vec<String> {
        names(&["input", "policy"])
    }

    fn declared_outputs(&self) -> Vec<String> {
        names(&["output"])
    }

    fn run(&self, ctx: &Context, inputs: StepInputs) -> Result<StepOutput, StepError> {
        let policy = QualityGatePolicy::from_value(&policy_value(&inputs)?).map_err(policy_err)?;
        let table = inputs.table("input")?;
        let (table, metrics) = evaluate_quality_gates(table, &policy, Some(ctx)).map_err(policy_err)?;
        let mut out = StepOutput::single("output", table);
        out.metrics = metrics.to_metrics();
        Ok(out)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DedupeStep;

impl StepHandler for DedupeStep {
    fn declared_inputs(&self) -> Vec<String> {
        names(&["input", "policy"])
    }

    fn declared_outputs(&self) -> Vec<String> {
        names(&["output"])
    }

    fn run(&self, _ctx: &Context, inputs: StepInputs) -> Result<StepOutput, StepError> {
        let policy = DedupePolicy::from_value(&inputs.value("policy")?).map_err(policy_err)?;
        let (table, dropped) = apply_dedupe_policy(&inputs.table("input")?, &policy).map_err(policy_err)?;
        Ok(StepOutput::single("output", table).with_metric("rows_dropped", dropped as u64))
    }
}

/// Renombrado; en modo stream se aplica chunk a chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameStep;

impl StepHandler for RenameStep {
    fn declared_inputs(&self) -> Vec<String> {
        names(&["input", "policy"])
    }

    fn declared_outputs(&self) -> Vec<String> {
        names(&["output"])
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn run(&self, ctx: &Context, inputs: StepInputs) -> Result<StepOutput, StepError> {
        let policy = RenamePolicy::from_value(&inputs.value("policy")?).map_err(policy_err)?;
        match inputs.require("input")? {
            Payload::Stream(stream) => {
                // El primer chunk decide los diagnósticos; el resto se renombra sin re-emitir.
                if let Some(first) = stream.chunks().next() {
                    apply_rename_policy(&first?, &policy, Some(ctx)).map_err(policy_err)?;
                }
                let mut quiet = policy.clone();
                quiet.warn_on_missing_optional = false;
                let renamed = stream.map_chunks(move |chunk| {
                                        apply_rename_policy(&chunk, &quiet, None).map_err(|e| trakt_core::DataError::Source(e.to_string()))
                                    });
                Ok(StepOutput::single("output", renamed))
            }
            other => {
                let table = apply_rename_policy(&other.to_table()?, &policy, Some(ctx)).map_err(policy_err)?;
                Ok(StepOutput::single("output", table))
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JoinStep;

impl StepHandler for JoinStep {
    fn declared_inputs(&self) -> Vec<String> {
        names(&["left", "right", "policy"])
    }

    fn declared_outputs(&self) -> Vec<String> {
        names(&["output"])
    }

    fn run(&self, ctx: &Context, inputs: StepInputs) -> Result<StepOutput, StepError> {
        let policy = JoinPolicy::from_value(&inputs.value("policy")?).map_err(policy_err)?;
        let (table, stats) = apply_join_policy(&inputs.table("left")?, &inputs.table("right")?, &policy, Some(ctx)).map_err(policy_err)?;
        Ok(StepOutput::single("output", table).with_metric("rows_unmatched", json!(stats.rows_unmatched))
                                              .with_metric("rows_dropped", json!(stats.rows_dropped)))
    }
}

/// Registra `quality_gate`, `dedupe`, `rename` y `join`.
pub fn register_builtins(registry: &mut StepRegistry) {
    registry.register("quality_gate", || QualityGateStep);
    registry.register("dedupe", || DedupeStep);
    registry.register("rename", || RenameStep);
    registry.register("join", || JoinStep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use trakt_core::{Table, TableStream};

    fn ctx() -> Context {
        Context::new("run", "p")
    }

    fn inputs(pairs: Vec<(&str, Payload)>) -> StepInputs {
        StepInputs::new(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>())
    }

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn dedupe_step_reports_dropped_rows() {
        let t = table(&["id", "v"], vec![vec![json!(1), json!("a")], vec![json!(1), json!("b")], vec![json!(2), json!("c")]]);
        let out = DedupeStep.run(&ctx(),
                                 inputs(vec![("input", t.into()), ("policy", json!({"keys": "id", "winner": "first"}).into())]))
                            .unwrap();
        assert_eq!(out.metrics["rows_dropped"], json!(1));
        assert_eq!(out.data["output"].row_count(), Some(2));
    }

    #[test]
    fn join_step_fails_on_unmatched_rows() {
        let left = table(&["id"], vec![vec![json!(1)], vec![json!(2)]]);
        let right = table(&["id", "x"], vec![vec![json!(1), json!("a")]]);
        let err = JoinStep.run(&ctx(),
                               inputs(vec![("left", left.into()), ("right", right.into()), ("policy", json!({"keys": ["id"], "unmatched": "fail"}).into())]))
                          .unwrap_err();
        assert_eq!(err.kind, "PolicyError");
        assert!(err.message.contains("1 unmatched"), "{}", err.message);
    }

    #[test]
    fn rename_step_keeps_streams_lazy() {
        let chunks = vec![table(&["a"], vec![vec![json!(1)]]), table(&["a"], vec![vec![json!(2)]])];
        let out = RenameStep.run(&ctx(),
                                 inputs(vec![("input", TableStream::from_tables(chunks).into()),
                                             ("policy", json!({"mapping": {"a": "b"}}).into())]))
                            .unwrap();
        assert!(out.data["output"].is_stream());
        let collected = out.data["output"].to_table().unwrap();
        assert_eq!(collected.columns(), &["b".to_string()]);
        assert_eq!(collected.num_rows(), 2);
    }

    #[test]
    fn registers_builtin_aliases() {
        let mut registry = StepRegistry::new();
        register_builtins(&mut registry);
        for alias in ["quality_gate", "dedupe", "rename", "join"] {
            assert!(registry.contains(alias), "{alias}");
        }
    }
}
