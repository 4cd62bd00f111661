//! Combinación de múltiples partes de un mismo input.
//!
//! - `concat`: mismas columnas en el mismo orden.
//! - `validate_schema`: además, mismos tipos inferidos por columna.
//! - `union_by_name`: alinea por nombre en orden de primera aparición y
//!   rellena con `null`.
use serde_json::Value;
use trakt_core::{ColumnType, CombineStrategy, Table};

use crate::errors::PolicyError;

/// Combina partes etiquetadas por su origen (p. ej. ruta de archivo).
pub fn combine_tables(artifact: &str, parts: Vec<(String, Table)>, strategy: CombineStrategy) -> Result<Table, PolicyError> {
    let err = |message: String| PolicyError::Combine { artifact: artifact.to_string(),
                                                       message };
    let mut iter = parts.into_iter();
    let (first_origin, first) = iter.next().ok_or_else(|| err("no parts to combine".to_string()))?;

    match strategy {
        CombineStrategy::Concat | CombineStrategy::ValidateSchema => {
            let first_types = first.dtypes();
            let mut out = first;
            for (origin, part) in iter {
                if part.columns() != out.columns() {
                    return Err(err(format!("columns of '{origin}' {:?} differ from '{first_origin}' {:?}",
                                           part.columns(),
                                           out.columns())));
                }
                if strategy == CombineStrategy::ValidateSchema {
                    for (column, t) in part.dtypes() {
                        let expected = first_types.get(&column).copied().unwrap_or(ColumnType::Null);
                        if t != expected {
                            return Err(err(format!("column '{column}' of '{origin}' has type {t}, expected {expected}")));
                        }
                    }
                }
                out.append(part)?;
            }
            Ok(out)
        }
        CombineStrategy::UnionByName => {
            let mut parts: Vec<Table> = vec![first];
            parts.extend(iter.map(|(_, t)| t));
            let mut columns: Vec<String> = Vec::new();
            for part in &parts {
                for c in part.columns() {
                    if !columns.contains(c) {
                        columns.push(c.clone());
                    }
                }
            }
            let mut rows: Vec<Vec<Value>> = Vec::new();
            for part in parts {
                let positions: Vec<Option<usize>> = columns.iter().map(|c| part.column_index(c)).collect();
                let (_, part_rows) = part.into_parts();
                rows.extend(part_rows.into_iter().map(|row| {
                                                     positions.iter()
                                                              .map(|p| p.map(|i| row[i].clone()).unwrap_or(Value::Null))
                                                              .collect::<Vec<Value>>()
                                                 }));
            }
            Ok(Table::new(columns, rows)?)
        }
    }
}
