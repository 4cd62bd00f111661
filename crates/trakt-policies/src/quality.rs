//! Quality gates.
//!
//! Cada chequeo suma a `quality_checks`; cada violación a
//! `quality_violations` y, según el modo efectivo del gate, falla o emite
//! `warning.quality_gate` sumando a `quality_warnings`. La tabla se devuelve
//! sin modificar.
use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trakt_core::{Context, Table};

use crate::decision::{column_indices, emit_policy_event, row_key, PolicyMode};
use crate::errors::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityGate {
    RequiredColumns,
    UniqueKeys,
    RowCount,
    MaxNullRatio,
}

impl QualityGate {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityGate::RequiredColumns => "required_columns",
            QualityGate::UniqueKeys => "unique_keys",
            QualityGate::RowCount => "row_count",
            QualityGate::MaxNullRatio => "max_null_ratio",
        }
    }
}

impl fmt::Display for QualityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowCountBounds {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum KeySpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQualityPolicy {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    required_columns: Vec<String>,
    #[serde(default)]
    unique_keys: Vec<KeySpec>,
    #[serde(default)]
    row_count: Option<RowCountBounds>,
    #[serde(default)]
    max_null_ratio: IndexMap<String, f64>,
    #[serde(default)]
    gate_modes: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityGatePolicy {
    pub mode: PolicyMode,
    pub required_columns: Vec<String>,
    pub unique_keys: Vec<Vec<String>>,
    pub row_count: RowCountBounds,
    pub max_null_ratio: IndexMap<String, f64>,
    pub gate_modes: IndexMap<String, PolicyMode>,
}

impl QualityGatePolicy {
    pub fn from_value(value: &Value) -> Result<Self, PolicyError> {
        let raw: RawQualityPolicy = match value {
            Value::Null => RawQualityPolicy::default(),
            other => serde_json::from_value(other.clone()).map_err(|e| PolicyError::invalid("quality gate", e.to_string()))?,
        };
        let parse_mode = |field: &str, value: &str| {
            PolicyMode::parse(value).ok_or_else(|| PolicyError::invalid("quality gate", format!("unsupported {field} '{value}'")))
        };
        let mode = match raw.mode.as_deref() {
            None => PolicyMode::Fail,
            Some(m) => parse_mode("mode", m)?,
        };
        let mut gate_modes = IndexMap::new();
        for (gate, m) in &raw.gate_modes {
            gate_modes.insert(gate.clone(), parse_mode(&format!("gate_modes.{gate}"), m)?);
        }
        let policy = Self { mode,
                            required_columns: raw.required_columns,
                            unique_keys: raw.unique_keys
                                            .into_iter()
                                            .map(|k| match k {
                                                KeySpec::One(c) => vec![c],
                                                KeySpec::Many(cs) => cs,
                                            })
                                            .collect(),
                            row_count: raw.row_count.unwrap_or_default(),
                            max_null_ratio: raw.max_null_ratio,
                            gate_modes };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let invalid = |m: String| PolicyError::invalid("quality gate", m);
        if self.row_count.min.is_some_and(|m| m < 0) {
            return Err(invalid("row_count min must be >= 0".into()));
        }
        if self.row_count.max.is_some_and(|m| m < 0) {
            return Err(invalid("row_count max must be >= 0".into()));
        }
        if let (Some(min), Some(max)) = (self.row_count.min, self.row_count.max) {
            if min > max {
                return Err(invalid("row_count min cannot exceed max".into()));
            }
        }
        for (column, ratio) in &self.max_null_ratio {
            if !(0.0..=1.0).contains(ratio) {
                return Err(invalid(format!("max_null_ratio for '{column}' must be between 0 and 1")));
            }
        }
        Ok(())
    }

    fn mode_for(&self, gate: QualityGate) -> PolicyMode {
        self.gate_modes.get(gate.as_str()).copied().unwrap_or(self.mode)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityMetrics {
    pub quality_checks: u64,
    pub quality_violations: u64,
    pub quality_warnings: u64,
}

impl QualityMetrics {
    pub fn to_metrics(&self) -> IndexMap<String, Value> {
        IndexMap::from([("quality_checks".to_string(), json!(self.quality_checks)),
                        ("quality_violations".to_string(), json!(self.quality_violations)),
                        ("quality_warnings".to_string(), json!(self.quality_warnings))])
    }
}

struct GateRun<'a> {
    policy: &'a QualityGatePolicy,
    ctx: Option<&'a Context>,
    metrics: QualityMetrics,
}

impl GateRun<'_> {
    fn violation(&mut self, gate: QualityGate, message: String, details: Value) -> Result<(), PolicyError> {
        self.metrics.quality_violations += 1;
        match self.policy.mode_for(gate) {
            PolicyMode::Fail => Err(PolicyError::QualityGate { gate: gate.to_string(),
                                                               message }),
            PolicyMode::Warn => {
                self.metrics.quality_warnings += 1;
                let mut payload = match details {
                    Value::Object(obj) => obj,
                    _ => serde_json::Map::new(),
                };
                payload.insert("gate".into(), json!(gate.as_str()));
                payload.insert("message".into(), json!(message));
                emit_policy_event(self.ctx, "warning.quality_gate", Value::Object(payload));
                Ok(())
            }
        }
    }
}

pub fn evaluate_quality_gates(table: Table, policy: &QualityGatePolicy, ctx: Option<&Context>) -> Result<(Table, QualityMetrics), PolicyError> {
    policy.validate()?;
    let mut run = GateRun { policy,
                            ctx,
                            metrics: QualityMetrics::default() };

    if !policy.required_columns.is_empty() {
        run.metrics.quality_checks += 1;
        if let Err(missing) = column_indices(table.columns(), &policy.required_columns) {
            run.violation(QualityGate::RequiredColumns,
                          format!("Missing required columns: {missing:?}."),
                          json!({ "columns": missing }))?;
        }
    }

    for keys in &policy.unique_keys {
        run.metrics.quality_checks += 1;
        match column_indices(table.columns(), keys) {
            Err(missing) => run.violation(QualityGate::UniqueKeys,
                                          format!("Unique key columns missing: {missing:?}."),
                                          json!({ "keys": keys, "missing_columns": missing }))?,
            Ok(indices) => {
                let distinct: HashSet<String> = table.rows().iter().map(|r| row_key(r, &indices)).collect();
                let duplicates = table.num_rows() - distinct.len();
                if duplicates > 0 {
                    run.violation(QualityGate::UniqueKeys,
                                  format!("Found {duplicates} duplicate rows for unique keys {keys:?}."),
                                  json!({ "keys": keys, "duplicate_rows": duplicates }))?;
                }
            }
        }
    }

    let bounds = &policy.row_count;
    if bounds.min.is_some() || bounds.max.is_some() {
        run.metrics.quality_checks += 1;
        let rows = table.num_rows() as i64;
        if let Some(min) = bounds.min.filter(|m| rows < *m) {
            run.violation(QualityGate::RowCount,
                          format!("Row count {rows} is below minimum {min}."),
                          json!({ "row_count": rows, "min": min }))?;
        }
        if let Some(max) = bounds.max.filter(|m| rows > *m) {
            run.violation(QualityGate::RowCount,
                          format!("Row count {rows} exceeds maximum {max}."),
                          json!({ "row_count": rows, "max": max }))?;
        }
    }

    for (column, threshold) in &policy.max_null_ratio {
        run.metrics.quality_checks += 1;
        let Some(values) = table.column_values(column) else {
            run.violation(QualityGate::MaxNullRatio,
                          format!("Null ratio column is missing: {column}."),
                          json!({ "column": column, "max_null_ratio": threshold }))?;
            continue;
        };
        if values.is_empty() {
            continue;
        }
        let ratio = values.iter().filter(|v| v.is_null()).count() as f64 / values.len() as f64;
        if ratio > *threshold {
            run.violation(QualityGate::MaxNullRatio,
                          format!("Column '{column}' null ratio {ratio:.4} exceeds threshold {threshold:.4}."),
                          json!({ "column": column, "null_ratio": ratio, "max_null_ratio": threshold }))?;
        }
    }

    log::debug!("quality gates evaluated: {:?}", run.metrics);
    Ok((table, run.metrics))
}
