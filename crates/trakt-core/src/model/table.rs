//! Tabla en memoria.
//!
//! Una `Table` es la forma materializada de un artifact tabular: columnas
//! ordenadas y filas de celdas JSON escalares (`null`, bool, número, string).
//! El tipo de cada columna se infiere de sus celdas no nulas.
use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DataError;

/// Tipo lógico de una columna.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float64")]
    Float64,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "null")]
    Null,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Bool => "bool",
            ColumnType::String => "string",
            ColumnType::Null => "null",
        }
    }

    /// Acepta los nombres canónicos y sus alias habituales.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int64" | "int" | "integer" => Some(ColumnType::Int64),
            "float64" | "float" | "double" => Some(ColumnType::Float64),
            "bool" | "boolean" => Some(ColumnType::Bool),
            "string" | "str" | "object" => Some(ColumnType::String),
            "null" => Some(ColumnType::Null),
            _ => None,
        }
    }

    /// Infere el tipo de una secuencia de celdas.
    pub fn infer<'a, I>(cells: I) -> Self
        where I: IntoIterator<Item = &'a Value>
    {
        let mut current = ColumnType::Null;
        for cell in cells {
            let cell_type = match cell {
                Value::Null => continue,
                Value::Bool(_) => ColumnType::Bool,
                Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Int64,
                Value::Number(_) => ColumnType::Float64,
                _ => ColumnType::String,
            };
            current = match (current, cell_type) {
                (ColumnType::Null, t) => t,
                (a, b) if a == b => a,
                (ColumnType::Int64, ColumnType::Float64) | (ColumnType::Float64, ColumnType::Int64) => ColumnType::Float64,
                _ => return ColumnType::String,
            };
        }
        current
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Construye una tabla validando nombres únicos y ancho de filas.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, DataError> {
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(DataError::DuplicateColumn(c.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DataError::RowWidth { row: i,
                                                 expected: columns.len(),
                                                 got: row.len() });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Result<Self, DataError> {
        Self::new(columns, Vec::new())
    }

    /// Tabla a partir de registros JSON (objetos). Las columnas siguen el
    /// orden de primera aparición; claves ausentes quedan en `null`.
    pub fn from_records(records: &[Value]) -> Result<Self, DataError> {
        let mut columns: Vec<String> = Vec::new();
        for rec in records {
            let obj = rec.as_object()
                         .ok_or_else(|| DataError::Source(format!("record is not an object: {rec}")))?;
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records.iter()
                          .filter_map(Value::as_object)
                          .map(|obj| {
                              columns.iter()
                                     .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                                     .collect()
                          })
                          .collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        let idx = self.column_index(name)?;
        Some(ColumnType::infer(self.rows.iter().map(|r| &r[idx])))
    }

    /// Tipos inferidos por columna, en orden.
    pub fn dtypes(&self) -> IndexMap<String, ColumnType> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), ColumnType::infer(self.rows.iter().map(|r| &r[i]))))
            .collect()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), DataError> {
        if row.len() != self.columns.len() {
            return Err(DataError::RowWidth { row: self.rows.len(),
                                             expected: self.columns.len(),
                                             got: row.len() });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Agrega las filas de `other`; exige las mismas columnas en el mismo orden.
    pub fn append(&mut self, other: Table) -> Result<(), DataError> {
        if other.columns != self.columns {
            return Err(DataError::ColumnsMismatch { expected: self.columns.clone(),
                                                    got: other.columns });
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Nueva tabla con `f` aplicado a cada celda de `column`.
    pub fn map_column<F>(&self, column: &str, f: F) -> Result<Table, DataError>
        where F: Fn(&Value) -> Value
    {
        let idx = self.column_index(column)
                      .ok_or_else(|| DataError::MissingColumn(column.to_string()))?;
        let rows = self.rows
                       .iter()
                       .map(|r| {
                           let mut row = r.clone();
                           row[idx] = f(&r[idx]);
                           row
                       })
                       .collect();
        Ok(Table { columns: self.columns.clone(),
                   rows })
    }

    /// Subconjunto de filas por índice, en el orden dado.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table { columns: self.columns.clone(),
                rows: indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect() }
    }

    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|r| {
                let obj: Map<String, Value> = self.columns.iter().cloned().zip(r.iter().cloned()).collect();
                Value::Object(obj)
            })
            .collect()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}
