//! Contrato de decisión compartido por las políticas.
//!
//! Una violación o bien falla (`PolicyError`) o, en modo `warn`, emite un
//! evento diagnóstico y se contabiliza. Nunca ambas cosas.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use trakt_core::telemetry::{attributes_from, Attributes};
use trakt_core::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Warn,
    #[default]
    Fail,
}

impl PolicyMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warn" => Some(PolicyMode::Warn),
            "fail" => Some(PolicyMode::Fail),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::Warn => "warn",
            PolicyMode::Fail => "fail",
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emite un evento de política si hay contexto disponible.
pub fn emit_policy_event(ctx: Option<&Context>, name: &str, attributes: Value) {
    let attributes: Attributes = attributes_from(attributes);
    match ctx {
        Some(ctx) => ctx.emit_event(name, attributes),
        None => log::warn!("{name} {attributes:?}"),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Acepta un nombre o una lista de nombres.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where D: Deserializer<'de>
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Clave comparable de una fila para agrupar por columnas.
pub(crate) fn row_key(row: &[Value], indices: &[usize]) -> String {
    let values: Vec<&Value> = indices.iter().map(|&i| &row[i]).collect();
    serde_json::to_string(&values).unwrap_or_default()
}

/// Índices de `columns` en `available`; devuelve los faltantes como error.
pub(crate) fn column_indices(available: &[String], columns: &[String]) -> Result<Vec<usize>, Vec<String>> {
    let mut missing: Vec<String> = columns.iter().filter(|c| !available.contains(c)).cloned().collect();
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(missing);
    }
    Ok(columns.iter().filter_map(|c| available.iter().position(|a| a == c)).collect())
}
