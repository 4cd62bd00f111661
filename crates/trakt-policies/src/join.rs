//! Join de dos tablas con política declarativa.
//!
//! Filas sin match a la derecha ("left only") se tratan según `unmatched`:
//! `allow` las deja pasar, `warn` emite `warning.join_unmatched`, `drop`
//! conserva sólo filas con match en ambos lados y `fail` aborta.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trakt_core::{Context, Table};

use crate::decision::{column_indices, emit_policy_event, one_or_many, row_key};
use crate::errors::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    #[default]
    Left,
    Right,
    Inner,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionMode {
    #[default]
    Suffix,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedMode {
    #[default]
    Allow,
    Warn,
    Drop,
    Fail,
}

fn default_suffixes() -> (String, String) {
    ("_left".to_string(), "_right".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinPolicy {
    #[serde(deserialize_with = "one_or_many")]
    pub keys: Vec<String>,
    #[serde(default)]
    pub how: JoinHow,
    #[serde(default)]
    pub collision: CollisionMode,
    #[serde(default = "default_suffixes")]
    pub suffixes: (String, String),
    #[serde(default)]
    pub unmatched: UnmatchedMode,
}

impl JoinPolicy {
    pub fn new<I, S>(keys: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Self { keys: keys.into_iter().map(Into::into).collect(),
               how: JoinHow::default(),
               collision: CollisionMode::default(),
               suffixes: default_suffixes(),
               unmatched: UnmatchedMode::default() }
    }

    pub fn from_value(value: &Value) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_value(value.clone()).map_err(|e| PolicyError::invalid("join", e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.keys.is_empty() {
            return Err(PolicyError::invalid("join", "requires at least one key column"));
        }
        Ok(())
    }
}

/// Estadísticas del join para el manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub rows_unmatched: usize,
    pub rows_dropped: usize,
}

pub fn apply_join_policy(left: &Table, right: &Table, policy: &JoinPolicy, ctx: Option<&Context>) -> Result<(Table, JoinStats), PolicyError> {
    policy.validate()?;
    let left_keys = column_indices(left.columns(), &policy.keys);
    let right_keys = column_indices(right.columns(), &policy.keys);
    let (left_keys, right_keys) = match (left_keys, right_keys) {
        (Ok(l), Ok(r)) => (l, r),
        (l, r) => {
            let missing_left = l.err().unwrap_or_default();
            let missing_right = r.err().unwrap_or_default();
            let mut columns = missing_left.clone();
            columns.extend(missing_right.iter().cloned());
            return Err(PolicyError::MissingColumns { policy: "join",
                                                     columns,
                                                     context: format!(" (left={missing_left:?}, right={missing_right:?})") });
        }
    };

    // Columnas no-clave presentes en ambos lados.
    let overlap: Vec<&String> = left.columns()
                                    .iter()
                                    .filter(|c| !policy.keys.contains(c) && right.has_column(c))
                                    .collect();
    if !overlap.is_empty() && policy.collision == CollisionMode::None {
        return Err(PolicyError::DuplicateColumns { policy: "join",
                                                   columns: overlap.into_iter().cloned().collect() });
    }
    let (left_suffix, right_suffix) = &policy.suffixes;
    let rename = |c: &String, suffix: &str| {
        if overlap.contains(&c) {
            format!("{c}{suffix}")
        } else {
            c.clone()
        }
    };

    let mut columns: Vec<String> = left.columns().iter().map(|c| rename(c, left_suffix)).collect();
    let right_extra: Vec<usize> = (0..right.columns().len()).filter(|i| !right_keys.contains(i)).collect();
    columns.extend(right_extra.iter().map(|&i| rename(&right.columns()[i], right_suffix)));

    let mut right_index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        right_index.entry(row_key(row, &right_keys)).or_default().push(i);
    }

    let left_width = left.columns().len();
    let null_right = || vec![Value::Null; right_extra.len()];
    let right_cells = |row: &[Value]| right_extra.iter().map(|&i| row[i].clone()).collect::<Vec<Value>>();

    // (fila, matched)
    let mut rows: Vec<(Vec<Value>, bool)> = Vec::new();
    let mut unmatched = 0usize;
    let mut right_matched = vec![false; right.num_rows()];

    match policy.how {
        JoinHow::Left | JoinHow::Inner | JoinHow::Outer => {
            for lrow in left.rows() {
                match right_index.get(&row_key(lrow, &left_keys)) {
                    Some(matches) => {
                        for &ri in matches {
                            right_matched[ri] = true;
                            let mut row = lrow.clone();
                            row.extend(right_cells(&right.rows()[ri]));
                            rows.push((row, true));
                        }
                    }
                    None if policy.how == JoinHow::Inner => {}
                    None => {
                        unmatched += 1;
                        let mut row = lrow.clone();
                        row.extend(null_right());
                        rows.push((row, false));
                    }
                }
            }
            if policy.how == JoinHow::Outer {
                for (_, rrow) in right.rows().iter().enumerate().filter(|(ri, _)| !right_matched[*ri]) {
                    rows.push((right_only_row(rrow, left_width, &left_keys, &right_keys, &right_cells), false));
                }
            }
        }
        JoinHow::Right => {
            let mut left_index: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, row) in left.rows().iter().enumerate() {
                left_index.entry(row_key(row, &left_keys)).or_default().push(i);
            }
            for rrow in right.rows() {
                match left_index.get(&row_key(rrow, &right_keys)) {
                    Some(matches) => {
                        for &li in matches {
                            let mut row = left.rows()[li].clone();
                            row.extend(right_cells(rrow));
                            rows.push((row, true));
                        }
                    }
                    None => rows.push((right_only_row(rrow, left_width, &left_keys, &right_keys, &right_cells), false)),
                }
            }
        }
    }

    let mut stats = JoinStats { rows_unmatched: unmatched,
                                rows_dropped: 0 };
    if unmatched > 0 {
        match policy.unmatched {
            UnmatchedMode::Allow => {}
            UnmatchedMode::Warn => {
                emit_policy_event(ctx, "warning.join_unmatched", json!({ "unmatched_count": unmatched, "keys": policy.keys }));
            }
            UnmatchedMode::Drop => {
                let before = rows.len();
                rows.retain(|(_, matched)| *matched);
                stats.rows_dropped = before - rows.len();
            }
            UnmatchedMode::Fail => return Err(PolicyError::JoinUnmatched { count: unmatched }),
        }
    }

    let table = Table::new(columns, rows.into_iter().map(|(row, _)| row).collect())?;
    Ok((table, stats))
}

/// Fila sólo-derecha: columnas izquierdas nulas salvo las claves.
fn right_only_row<F>(rrow: &[Value], left_width: usize, left_keys: &[usize], right_keys: &[usize], right_cells: &F) -> Vec<Value>
    where F: Fn(&[Value]) -> Vec<Value>
{
    let mut row = vec![Value::Null; left_width];
    for (li, ri) in left_keys.iter().zip(right_keys) {
        row[*li] = rrow[*ri].clone();
    }
    row.extend(right_cells(rrow));
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> Table {
        Table::from_records(&[json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"}), json!({"id": 3, "name": "c"})]).unwrap()
    }

    fn right() -> Table {
        Table::from_records(&[json!({"id": 1, "name": "A", "score": 10}), json!({"id": 4, "name": "D", "score": 40})]).unwrap()
    }

    #[test]
    fn left_join_suffixes_collisions() {
        let (t, stats) = apply_join_policy(&left(), &right(), &JoinPolicy::new(["id"]), None).unwrap();
        assert_eq!(t.columns(), &["id", "name_left", "name_right", "score"].map(String::from));
        assert_eq!(t.num_rows(), 3);
        assert_eq!(stats.rows_unmatched, 2);
        assert_eq!(t.get(1, "score"), Some(&Value::Null));
    }

    #[test]
    fn unmatched_drop_and_fail() {
        let mut policy = JoinPolicy::new(["id"]);
        policy.unmatched = UnmatchedMode::Drop;
        let (t, stats) = apply_join_policy(&left(), &right(), &policy, None).unwrap();
        assert_eq!(t.num_rows(), 1);
        assert_eq!(stats.rows_dropped, 2);

        policy.unmatched = UnmatchedMode::Fail;
        let err = apply_join_policy(&left(), &right(), &policy, None).unwrap_err();
        assert_eq!(err.to_string(), "Join policy failed due to 2 unmatched rows.");
    }

    #[test]
    fn unmatched_warn_emits_event_and_keeps_rows() {
        use std::sync::{Arc, Mutex};
        use trakt_core::Attributes;

        let seen: Arc<Mutex<Vec<(String, Attributes)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ctx = Context::new("run", "p");
        ctx.add_hook(Arc::new(move |name: &str, attrs: &Attributes| sink.lock().unwrap().push((name.to_string(), attrs.clone()))));

        let mut policy = JoinPolicy::new(["id"]);
        policy.unmatched = UnmatchedMode::Warn;
        let (t, stats) = apply_join_policy(&left(), &right(), &policy, Some(&ctx)).unwrap();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(stats.rows_unmatched, 2);
        assert_eq!(stats.rows_dropped, 0);

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "warning.join_unmatched");
        assert_eq!(events[0].1["unmatched_count"], json!(2));
    }

    #[test]
    fn outer_and_right_joins_keep_right_rows() {
        let mut policy = JoinPolicy::new(["id"]);
        policy.how = JoinHow::Outer;
        let (t, _) = apply_join_policy(&left(), &right(), &policy, None).unwrap();
        assert_eq!(t.num_rows(), 4);
        assert_eq!(t.get(3, "id"), Some(&json!(4)));

        policy.how = JoinHow::Right;
        let (t, stats) = apply_join_policy(&left(), &right(), &policy, None).unwrap();
        assert_eq!(t.num_rows(), 2);
        assert_eq!(stats.rows_unmatched, 0);
    }

    #[test]
    fn policy_parsing_and_key_checks() {
        let policy = JoinPolicy::from_value(&json!({"keys": "id", "how": "inner", "collision": "none"})).unwrap();
        assert_eq!(policy.keys, vec!["id".to_string()]);
        assert!(matches!(apply_join_policy(&left(), &right(), &policy, None), Err(PolicyError::DuplicateColumns { .. })));
        assert!(JoinPolicy::from_value(&json!({"keys": [], "how": "left"})).is_err());
        assert!(JoinPolicy::from_value(&json!({"keys": "id", "how": "cross"})).is_err());

        let missing = apply_join_policy(&left(), &right(), &JoinPolicy::new(["score"]), None).unwrap_err();
        assert!(matches!(missing, PolicyError::MissingColumns { .. }));
    }
}
