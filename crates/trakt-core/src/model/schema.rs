//! Schema declarado de un artifact.
//!
//! Formas aceptadas en la definición:
//! - lista de columnas: `[id, amount]`
//! - mapping con `columns` y/o `dtypes` (ninguna otra clave)
//! - cualquier otro mapping se interpreta como `dtypes`
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::table::ColumnType;
use crate::errors::SchemaError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtypes: Option<IndexMap<String, ColumnType>>,
}

impl ArtifactSchema {
    pub fn with_columns<I, S>(columns: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        Self { columns: Some(columns.into_iter().map(Into::into).collect()),
               dtypes: None }
    }

    pub fn with_dtypes<I, S>(dtypes: I) -> Self
        where I: IntoIterator<Item = (S, ColumnType)>,
              S: Into<String>
    {
        Self { columns: None,
               dtypes: Some(dtypes.into_iter().map(|(k, v)| (k.into(), v)).collect()) }
    }

    /// Parsea la forma declarativa. `artifact` sólo se usa en los mensajes.
    pub fn parse(artifact: &str, value: &Value) -> Result<Self, SchemaError> {
        let invalid = |message: String| SchemaError::Invalid { artifact: artifact.to_string(),
                                                               message };
        let schema = match value {
            Value::Array(_) => Self { columns: Some(parse_columns(value).map_err(invalid)?),
                                      dtypes: None },
            Value::Object(map) if map.contains_key("columns") || map.contains_key("dtypes") => {
                if let Some(extra) = map.keys().find(|k| *k != "columns" && *k != "dtypes") {
                    return Err(invalid(format!("unexpected key '{extra}' (expected 'columns' and/or 'dtypes')")));
                }
                let columns = map.get("columns").map(parse_columns).transpose().map_err(invalid)?;
                let dtypes = map.get("dtypes").map(parse_dtypes).transpose().map_err(invalid)?;
                Self { columns, dtypes }
            }
            Value::Object(_) => Self { columns: None,
                                       dtypes: Some(parse_dtypes(value).map_err(invalid)?) },
            other => return Err(invalid(format!("expected a list or mapping, got {other}"))),
        };
        if let (Some(columns), Some(dtypes)) = (&schema.columns, &schema.dtypes) {
            let unknown: Vec<&String> = dtypes.keys().filter(|k| !columns.contains(k)).collect();
            if !unknown.is_empty() {
                return Err(invalid(format!("dtypes reference unknown columns {unknown:?}")));
            }
        }
        Ok(schema)
    }

    pub fn to_value(&self) -> Value {
        let mut out = serde_json::Map::new();
        if let Some(c) = &self.columns {
            out.insert("columns".into(), json!(c));
        }
        if let Some(d) = &self.dtypes {
            let dtypes: serde_json::Map<String, Value> = d.iter().map(|(k, v)| (k.clone(), json!(v.as_str()))).collect();
            out.insert("dtypes".into(), Value::Object(dtypes));
        }
        Value::Object(out)
    }
}

fn parse_columns(value: &Value) -> Result<Vec<String>, String> {
    let items = value.as_array().ok_or_else(|| "columns must be a list of names".to_string())?;
    let mut columns: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let name = item.as_str().ok_or_else(|| format!("column names must be strings, got {item}"))?;
        if columns.iter().any(|c| c == name) {
            return Err(format!("duplicate column '{name}'"));
        }
        columns.push(name.to_string());
    }
    Ok(columns)
}

fn parse_dtypes(value: &Value) -> Result<IndexMap<String, ColumnType>, String> {
    let map = value.as_object().ok_or_else(|| "dtypes must be a mapping".to_string())?;
    let mut dtypes = IndexMap::with_capacity(map.len());
    for (column, t) in map {
        let name = t.as_str().ok_or_else(|| format!("dtype of '{column}' must be a string"))?;
        let parsed = ColumnType::parse(name).ok_or_else(|| format!("unknown dtype '{name}' for column '{column}'"))?;
        dtypes.insert(column.clone(), parsed);
    }
    Ok(dtypes)
}
