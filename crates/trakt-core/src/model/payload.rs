//! Valores del namespace de artifacts.
//!
//! `Payload` es lo que circula entre steps: tablas materializadas, streams
//! perezosos de chunks, valores JSON literales y composiciones (listas y
//! mappings) de los anteriores.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::table::Table;
use crate::errors::DataError;

pub type ChunkIter = Box<dyn Iterator<Item = Result<Table, DataError>>>;

/// Secuencia perezosa y finita de chunks. Cada llamada a `chunks()` vuelve a
/// leer desde el principio.
#[derive(Clone)]
pub struct TableStream {
    source: Arc<dyn Fn() -> ChunkIter + Send + Sync>,
}

impl TableStream {
    pub fn new<F>(source: F) -> Self
        where F: Fn() -> ChunkIter + Send + Sync + 'static
    {
        Self { source: Arc::new(source) }
    }

    /// Stream sobre tablas ya materializadas.
    pub fn from_tables(tables: Vec<Table>) -> Self {
        let tables = Arc::new(tables);
        Self::new(move || {
            let tables = Arc::clone(&tables);
            Box::new((0..tables.len()).map(move |i| Ok::<Table, DataError>(tables[i].clone())))
        })
    }

    pub fn chunks(&self) -> ChunkIter {
        (self.source)()
    }

    /// Aplica `f` a cada chunk de forma perezosa.
    pub fn map_chunks<F>(&self, f: F) -> TableStream
        where F: Fn(Table) -> Result<Table, DataError> + Send + Sync + 'static
    {
        let inner = self.clone();
        let f = Arc::new(f);
        TableStream::new(move || {
            let f = Arc::clone(&f);
            Box::new(inner.chunks().map(move |chunk| chunk.and_then(|t| (*f)(t))))
        })
    }

    /// Materializa todos los chunks en una tabla.
    pub fn collect(&self) -> Result<Table, DataError> {
        let mut out: Option<Table> = None;
        for chunk in self.chunks() {
            let chunk = chunk?;
            match out.as_mut() {
                None => out = Some(chunk),
                Some(acc) => acc.append(chunk)?,
            }
        }
        Ok(out.unwrap_or_default())
    }
}

impl fmt::Debug for TableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TableStream")
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Table(Table),
    Stream(TableStream),
    Value(Value),
    List(Vec<Payload>),
    Map(IndexMap<String, Payload>),
}

impl Payload {
    /// Filas de la payload: tablas por su largo, listas y mappings como la
    /// suma de los conteos conocidos. Streams, strings y escalares no tienen
    /// conteo.
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Payload::Table(t) => Some(t.num_rows()),
            Payload::Stream(_) | Payload::Value(_) => None,
            Payload::List(items) => sum_known(items.iter()),
            Payload::Map(items) => sum_known(items.values()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Table(_) => "table",
            Payload::Stream(_) => "stream",
            Payload::Value(_) => "value",
            Payload::List(_) => "list",
            Payload::Map(_) => "map",
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Payload::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Payload::Stream(_))
    }

    /// Materializa tablas y streams; cualquier otra forma es un error.
    pub fn to_table(&self) -> Result<Table, DataError> {
        match self {
            Payload::Table(t) => Ok(t.clone()),
            Payload::Stream(s) => s.collect(),
            other => Err(DataError::NotATable(other.kind_name().to_string())),
        }
    }

    /// Vista como lista: `List` o un arreglo JSON.
    pub fn into_list(self) -> Option<Vec<Payload>> {
        match self {
            Payload::List(items) => Some(items),
            Payload::Value(Value::Array(items)) => Some(items.into_iter().map(Payload::Value).collect()),
            _ => None,
        }
    }

    /// Vista como mapping: `Map` o un objeto JSON.
    pub fn into_map(self) -> Option<IndexMap<String, Payload>> {
        match self {
            Payload::Map(items) => Some(items),
            Payload::Value(Value::Object(obj)) => Some(obj.into_iter().map(|(k, v)| (k, Payload::Value(v))).collect()),
            _ => None,
        }
    }

    /// Representación JSON de valores literales (listas y mappings incluidos).
    /// Tablas y streams no tienen representación literal.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Payload::Value(v) => Some(v.clone()),
            Payload::List(items) => items.iter().map(Payload::to_json).collect::<Option<Vec<_>>>().map(Value::Array),
            Payload::Map(items) => items.iter()
                                        .map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                                        .collect::<Option<serde_json::Map<_, _>>>()
                                        .map(Value::Object),
            Payload::Table(_) | Payload::Stream(_) => None,
        }
    }
}

fn sum_known<'a, I>(items: I) -> Option<usize>
    where I: Iterator<Item = &'a Payload>
{
    let counts: Vec<usize> = items.filter_map(Payload::row_count).collect();
    if counts.is_empty() {
        None
    } else {
        Some(counts.into_iter().sum())
    }
}

impl From<Table> for Payload {
    fn from(t: Table) -> Self {
        Payload::Table(t)
    }
}

impl From<TableStream> for Payload {
    fn from(s: TableStream) -> Self {
        Payload::Stream(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Value(v)
    }
}
