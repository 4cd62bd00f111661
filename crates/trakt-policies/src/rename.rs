//! Renombrado de columnas con columnas requeridas/opcionales.
use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trakt_core::{Context, Table};

use crate::decision::emit_policy_event;
use crate::errors::PolicyError;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamePolicy {
    pub mapping: IndexMap<String, String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default = "default_true")]
    pub warn_on_missing_optional: bool,
}

impl RenamePolicy {
    pub fn new<I, A, B>(mapping: I) -> Self
        where I: IntoIterator<Item = (A, B)>,
              A: Into<String>,
              B: Into<String>
    {
        Self { mapping: mapping.into_iter().map(|(a, b)| (a.into(), b.into())).collect(),
               required: Vec::new(),
               optional: Vec::new(),
               warn_on_missing_optional: true }
    }

    pub fn from_value(value: &Value) -> Result<Self, PolicyError> {
        serde_json::from_value(value.clone()).map_err(|e| PolicyError::invalid("rename", e.to_string()))
    }
}

pub fn apply_rename_policy(table: &Table, policy: &RenamePolicy, ctx: Option<&Context>) -> Result<Table, PolicyError> {
    let mut required_missing: Vec<String> = policy.required.iter().filter(|c| !table.has_column(c)).cloned().collect();
    if !required_missing.is_empty() {
        required_missing.sort();
        return Err(PolicyError::MissingColumns { policy: "rename",
                                                 columns: required_missing,
                                                 context: " (required)".to_string() });
    }

    let mut optional_missing: Vec<String> = policy.optional.iter().filter(|c| !table.has_column(c)).cloned().collect();
    if !optional_missing.is_empty() && policy.warn_on_missing_optional {
        optional_missing.sort();
        emit_policy_event(ctx, "warning.rename_optional_missing", json!({ "columns": optional_missing }));
    }

    let renamed: Vec<String> = table.columns()
                                    .iter()
                                    .map(|c| policy.mapping.get(c).cloned().unwrap_or_else(|| c.clone()))
                                    .collect();
    let mut seen = HashSet::new();
    let mut duplicated: Vec<String> = renamed.iter().filter(|c| !seen.insert(c.as_str())).cloned().collect();
    if !duplicated.is_empty() {
        duplicated.sort();
        duplicated.dedup();
        return Err(PolicyError::DuplicateColumns { policy: "rename",
                                                   columns: duplicated });
    }

    let (_, rows) = table.clone().into_parts();
    Ok(Table::new(renamed, rows)?)
}
