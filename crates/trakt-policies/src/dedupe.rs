//! Deduplicación por claves con regla de ganador.
//!
//! Exactamente un sobreviviente por grupo de claves. Los sobrevivientes
//! conservan el orden relativo de la primera fila de su grupo en el input.
use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trakt_core::Table;

use crate::decision::{column_indices, one_or_many, row_key};
use crate::errors::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    #[default]
    Latest,
    Earliest,
    Max,
    Min,
    First,
    Last,
    NonNull,
}

impl Winner {
    fn needs_order_by(&self) -> bool {
        matches!(self, Winner::Latest | Winner::Earliest | Winner::Max | Winner::Min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DedupePolicy {
    #[serde(deserialize_with = "one_or_many")]
    pub keys: Vec<String>,
    #[serde(default)]
    pub winner: Winner,
    #[serde(default)]
    pub order_by: Option<String>,
}

impl DedupePolicy {
    pub fn new<I, S>(keys: I, winner: Winner) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Self { keys: keys.into_iter().map(Into::into).collect(),
               winner,
               order_by: None }
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn from_value(value: &Value) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_value(value.clone()).map_err(|e| PolicyError::invalid("dedupe", e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.keys.is_empty() {
            return Err(PolicyError::invalid("dedupe", "requires at least one key column"));
        }
        if self.winner.needs_order_by() && self.order_by.is_none() {
            return Err(PolicyError::invalid("dedupe", "requires 'order_by' for this winner rule"));
        }
        Ok(())
    }
}

/// Devuelve la tabla deduplicada y la cantidad de filas descartadas.
pub fn apply_dedupe_policy(table: &Table, policy: &DedupePolicy) -> Result<(Table, usize), PolicyError> {
    policy.validate()?;
    let keys = column_indices(table.columns(), &policy.keys).map_err(|columns| PolicyError::MissingColumns { policy: "dedupe",
                                                                                                             columns,
                                                                                                             context: String::new() })?;
    let order_idx = match (&policy.order_by, policy.winner.needs_order_by()) {
        (Some(col), true) => {
            let idx = table.column_index(col)
                           .ok_or_else(|| PolicyError::MissingColumns { policy: "dedupe",
                                                                        columns: vec![col.clone()],
                                                                        context: " (order_by)".to_string() })?;
            Some(idx)
        }
        _ => None,
    };

    // clave -> filas del grupo en orden de input
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        groups.entry(row_key(row, &keys)).or_default().push(i);
    }

    let rows = table.rows();
    let survivors: Vec<usize> = groups.values()
                                      .map(|members| pick_winner(members, rows, policy.winner, order_idx))
                                      .collect();
    let dropped = table.num_rows() - survivors.len();
    Ok((table.take_rows(&survivors), dropped))
}

fn pick_winner(members: &[usize], rows: &[Vec<Value>], winner: Winner, order_idx: Option<usize>) -> usize {
    let first = members[0];
    match (winner, order_idx) {
        (Winner::First, _) => first,
        (Winner::Last, _) => *members.last().unwrap_or(&first),
        (Winner::NonNull, _) => {
            let non_null = |i: usize| rows[i].iter().filter(|v| !v.is_null()).count();
            // empates: gana la primera fila del grupo
            members.iter().copied().fold(first, |best, i| if non_null(i) > non_null(best) { i } else { best })
        }
        (Winner::Latest | Winner::Max, Some(col)) => pick_by(members, rows, col, Ordering::Greater),
        (Winner::Earliest | Winner::Min, Some(col)) => pick_by(members, rows, col, Ordering::Less),
        _ => first,
    }
}

/// Primer miembro cuyo valor supera estrictamente al mejor actual en la
/// dirección `want`. Los nulos nunca ganan frente a un valor.
fn pick_by(members: &[usize], rows: &[Vec<Value>], col: usize, want: Ordering) -> usize {
    members.iter().copied().fold(members[0], |best, i| {
                                let (cand, cur) = (&rows[i][col], &rows[best][col]);
                                match (cand.is_null(), cur.is_null()) {
                                    (true, _) => best,
                                    (false, true) => i,
                                    _ if compare_values(cand, cur) == want => i,
                                    _ => best,
                                }
                            })
}

/// Orden total entre celdas no nulas: números, luego bools, luego strings.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::Bool(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Table {
        Table::from_records(&[json!({"id": 1, "ts": 5, "v": "a"}),
                              json!({"id": 2, "ts": 1, "v": null}),
                              json!({"id": 1, "ts": 9, "v": null}),
                              json!({"id": 2, "ts": 3, "v": "d"}),
                              json!({"id": 1, "ts": 2, "v": "e"})]).unwrap()
    }

    fn ts(t: &Table) -> Vec<i64> {
        t.column_values("ts").unwrap().iter().map(|v| v.as_i64().unwrap()).collect()
    }

    #[test]
    fn winners_by_rule() {
        let cases = [(DedupePolicy::new(["id"], Winner::Latest).order_by("ts"), vec![9, 3]),
                     (DedupePolicy::new(["id"], Winner::Min).order_by("ts"), vec![2, 1]),
                     (DedupePolicy::new(["id"], Winner::First), vec![5, 1]),
                     (DedupePolicy::new(["id"], Winner::Last), vec![2, 3]),
                     (DedupePolicy::new(["id"], Winner::NonNull), vec![5, 3])];
        for (policy, expected) in cases {
            let (out, dropped) = apply_dedupe_policy(&table(), &policy).unwrap();
            assert_eq!(ts(&out), expected, "{:?}", policy.winner);
            assert_eq!(dropped, 3);
        }
    }

    #[test]
    fn order_by_is_required_for_ordered_rules() {
        let err = DedupePolicy::from_value(&json!({"keys": ["id"], "winner": "latest"})).unwrap_err();
        assert!(err.to_string().contains("order_by"), "{err}");
        assert!(DedupePolicy::from_value(&json!({"keys": "id", "winner": "first"})).is_ok());
        assert!(DedupePolicy::from_value(&json!({"keys": "id", "winner": "random"})).is_err());
    }

    #[test]
    fn missing_key_columns_fail() {
        let err = apply_dedupe_policy(&table(), &DedupePolicy::new(["nope"], Winner::First)).unwrap_err();
        assert!(matches!(err, PolicyError::MissingColumns { .. }));
    }

    #[test]
    fn non_null_ties_keep_the_first_row_of_the_group() {
        let t = Table::from_records(&[json!({"id": 1, "ts": 1, "v": null}),
                                      json!({"id": 1, "ts": 2, "v": "b"}),
                                      json!({"id": 1, "ts": 3, "v": "c"}),
                                      json!({"id": 2, "ts": 4, "v": "d"}),
                                      json!({"id": 2, "ts": 5, "v": "e"})]).unwrap();
        let (out, dropped) = apply_dedupe_policy(&t, &DedupePolicy::new(["id"], Winner::NonNull)).unwrap();
        assert_eq!(ts(&out), vec![2, 4]);
        assert_eq!(dropped, 3);
    }
}
