//! Adapter CSV.
//!
//! Opciones desde la metadata del artifact: `delimiter` (un carácter, `,`
//! por defecto) y `header` (`true` por defecto; sin header las columnas se
//! llaman `column_0..`). Las celdas vacías son `null`; el resto se
//! interpreta como entero, float, `true`/`false` o string, en ese orden.
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::IndexMap;
use serde_json::{Number, Value};
use trakt_core::constants::DEFAULT_STREAM_CHUNK_SIZE;
use trakt_core::{Artifact, ArtifactSchema, ChunkIter, DataError, ExecutionMode, Payload, Table, TableStream};
use trakt_policies::{combine_tables, validate_table_schema};

use crate::adapter::ArtifactAdapter;
use crate::errors::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',',
               header: true }
    }
}

impl CsvOptions {
    pub fn from_metadata(artifact: &str, metadata: &IndexMap<String, Value>) -> Result<Self, AdapterError> {
        let invalid = |key: &str, message: String| AdapterError::Option { artifact: artifact.to_string(),
                                                                          key: key.to_string(),
                                                                          message };
        let mut options = Self::default();
        match metadata.get("delimiter") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.len() == 1 && s.is_ascii() => options.delimiter = s.as_bytes()[0],
            Some(other) => return Err(invalid("delimiter", format!("expected a single ASCII character, got {other}"))),
        }
        match metadata.get("header") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(b)) => options.header = *b,
            Some(Value::Number(n)) if n.as_u64() == Some(0) => options.header = true,
            Some(Value::String(s)) => {
                options.header = match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "infer" | "0" => true,
                    "false" | "none" | "null" => false,
                    _ => return Err(invalid("header", format!("unsupported value '{s}'"))),
                }
            }
            Some(other) => return Err(invalid("header", format!("unsupported value {other}"))),
        }
        Ok(options)
    }
}

fn csv_error(path: &Path, err: impl std::fmt::Display) -> AdapterError {
    AdapterError::Csv { path: path.display().to_string(),
                        message: err.to_string() }
}

fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match raw {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn parse_record(record: &StringRecord) -> Vec<Value> {
    record.iter().map(parse_cell).collect()
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Archivo abierto para lectura incremental.
struct OpenFile {
    path: PathBuf,
    reader: csv::Reader<File>,
    columns: Vec<String>,
    pending: Option<StringRecord>,
    emitted: bool,
}

impl OpenFile {
    fn open(path: &Path, options: &CsvOptions) -> Result<Self, AdapterError> {
        let mut reader = ReaderBuilder::new().delimiter(options.delimiter)
                                             .has_headers(options.header)
                                             .from_path(path)
                                             .map_err(|e| csv_error(path, e))?;
        let mut pending = None;
        let columns = if options.header {
            reader.headers().map_err(|e| csv_error(path, e))?.iter().map(str::to_string).collect()
        } else {
            let mut first = StringRecord::new();
            let width = if reader.read_record(&mut first).map_err(|e| csv_error(path, e))? {
                let width = first.len();
                pending = Some(first);
                width
            } else {
                0
            };
            (0..width).map(|i| format!("column_{i}")).collect()
        };
        Ok(Self { path: path.to_path_buf(),
                  reader,
                  columns,
                  pending,
                  emitted: false })
    }

    fn read_rows(&mut self, limit: usize) -> Result<Vec<Vec<Value>>, AdapterError> {
        let mut rows = Vec::new();
        if let Some(first) = self.pending.take() {
            rows.push(parse_record(&first));
        }
        let mut record = StringRecord::new();
        while rows.len() < limit && self.reader.read_record(&mut record).map_err(|e| csv_error(&self.path, e))? {
            rows.push(parse_record(&record));
        }
        Ok(rows)
    }

    fn into_table(mut self) -> Result<Table, AdapterError> {
        let rows = self.read_rows(usize::MAX)?;
        Table::new(self.columns, rows).map_err(|e| csv_error(&self.path, e))
    }
}

/// Iterador de chunks: archivo tras archivo, `chunk_size` filas por chunk.
struct CsvChunks {
    artifact: String,
    schema: Option<ArtifactSchema>,
    options: CsvOptions,
    chunk_size: usize,
    paths: std::vec::IntoIter<PathBuf>,
    expected: Option<Vec<String>>,
    current: Option<OpenFile>,
    failed: bool,
}

impl CsvChunks {
    fn next_chunk(&mut self) -> Result<Option<Table>, AdapterError> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.paths.next() else {
                    return Ok(None);
                };
                let file = OpenFile::open(&path, &self.options)?;
                let expected = self.expected.get_or_insert_with(|| file.columns.clone());
                if *expected != file.columns {
                    return Err(AdapterError::StreamColumns { artifact: self.artifact.clone(),
                                                             path: path.display().to_string(),
                                                             expected: expected.clone(),
                                                             got: file.columns.clone() });
                }
                self.current = Some(file);
            }
            let Some(file) = self.current.as_mut() else {
                continue;
            };
            let rows = file.read_rows(self.chunk_size)?;
            if rows.is_empty() && file.emitted {
                self.current = None;
                continue;
            }
            file.emitted = true;
            let table = Table::new(file.columns.clone(), rows).map_err(|e| csv_error(&file.path, e))?;
            if let Some(schema) = &self.schema {
                validate_table_schema(&self.artifact, &file.path.display().to_string(), &table, schema)?;
            }
            return Ok(Some(table));
        }
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Table, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(DataError::Source(e.to_string())))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        Self
    }

    fn read_batch(&self, paths: &[PathBuf], artifact: &Artifact, options: &CsvOptions) -> Result<Table, AdapterError> {
        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            let table = OpenFile::open(path, options)?.into_table()?;
            let origin = path.display().to_string();
            if let Some(schema) = &artifact.schema {
                validate_table_schema(&artifact.name, &origin, &table, schema)?;
            }
            parts.push((origin, table));
        }
        if parts.len() == 1 {
            if let Some((_, table)) = parts.pop() {
                return Ok(table);
            }
        }
        Ok(combine_tables(&artifact.name, parts, artifact.combine_strategy)?)
    }

    fn read_stream(&self, paths: &[PathBuf], artifact: &Artifact, options: CsvOptions, chunk_size: usize) -> TableStream {
        let name = artifact.name.clone();
        let schema = artifact.schema.clone();
        let paths = paths.to_vec();
        TableStream::new(move || -> ChunkIter {
            Box::new(CsvChunks { artifact: name.clone(),
                                 schema: schema.clone(),
                                 options,
                                 chunk_size,
                                 paths: paths.clone().into_iter(),
                                 expected: None,
                                 current: None,
                                 failed: false })
        })
    }
}

struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    header: bool,
    columns: Option<Vec<String>>,
    rows: usize,
}

impl CsvSink {
    fn create(path: &Path, options: &CsvOptions) -> Result<Self, AdapterError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AdapterError::io(parent, e))?;
        }
        let writer = WriterBuilder::new().delimiter(options.delimiter)
                                         .has_headers(false)
                                         .from_path(path)
                                         .map_err(|e| csv_error(path, e))?;
        Ok(Self { path: path.to_path_buf(),
                  writer,
                  header: options.header,
                  columns: None,
                  rows: 0 })
    }

    fn write_table(&mut self, table: &Table) -> Result<(), AdapterError> {
        if let Some(columns) = &self.columns {
            if columns.as_slice() != table.columns() {
                return Err(DataError::ColumnsMismatch { expected: columns.clone(),
                                                        got: table.columns().to_vec() }.into());
            }
        } else {
            if self.header {
                self.writer.write_record(table.columns()).map_err(|e| csv_error(&self.path, e))?;
            }
            self.columns = Some(table.columns().to_vec());
        }
        for row in table.rows() {
            self.writer
                .write_record(row.iter().map(format_cell))
                .map_err(|e| csv_error(&self.path, e))?;
        }
        self.rows += table.num_rows();
        Ok(())
    }

    fn finish(mut self) -> Result<usize, AdapterError> {
        self.writer.flush().map_err(|e| AdapterError::io(&self.path, e))?;
        Ok(self.rows)
    }
}

impl ArtifactAdapter for CsvAdapter {
    fn file_extension(&self) -> &str {
        ".csv"
    }

    fn read_many(&self,
                 paths: &[PathBuf],
                 artifact: &Artifact,
                 mode: ExecutionMode,
                 chunk_size: Option<usize>)
                 -> Result<Payload, AdapterError> {
        let options = CsvOptions::from_metadata(&artifact.name, &artifact.metadata)?;
        if paths.is_empty() {
            return Err(AdapterError::NoInputFiles { artifact: artifact.name.clone(),
                                                    source_spec: artifact.uri.clone() });
        }
        match mode {
            ExecutionMode::Batch => Ok(Payload::Table(self.read_batch(paths, artifact, &options)?)),
            ExecutionMode::Stream => {
                let chunk_size = chunk_size.filter(|n| *n > 0).unwrap_or(DEFAULT_STREAM_CHUNK_SIZE);
                Ok(Payload::Stream(self.read_stream(paths, artifact, options, chunk_size)))
            }
        }
    }

    fn write(&self,
             data: &Payload,
             path: &Path,
             artifact_name: Option<&str>,
             _mode: ExecutionMode,
             artifact: Option<&Artifact>)
             -> Result<usize, AdapterError> {
        let name = artifact_name.or(artifact.map(|a| a.name.as_str())).unwrap_or("output");
        let options = match artifact {
            Some(a) => CsvOptions::from_metadata(name, &a.metadata)?,
            None => CsvOptions::default(),
        };
        let mut sink = match data {
            Payload::Table(_) | Payload::Stream(_) => CsvSink::create(path, &options)?,
            other => {
                return Err(AdapterError::Unsupported { artifact: name.to_string(),
                                                       payload: other.kind_name().to_string(),
                                                       format: "csv".to_string() })
            }
        };
        match data {
            Payload::Table(table) => sink.write_table(table)?,
            Payload::Stream(stream) => {
                for chunk in stream.chunks() {
                    sink.write_table(&chunk?)?;
                }
            }
            _ => {}
        }
        let rows = sink.finish()?;
        log::debug!("output '{name}': {rows} filas en {}", path.display());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trakt_core::CombineStrategy;

    #[test]
    fn parses_cells_by_type() {
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("42"), json!(42));
        assert_eq!(parse_cell("-1.5"), json!(-1.5));
        assert_eq!(parse_cell("true"), json!(true));
        assert_eq!(parse_cell("abc"), json!("abc"));
    }

    #[test]
    fn options_come_from_metadata() {
        let mut metadata = IndexMap::new();
        metadata.insert("delimiter".to_string(), json!(";"));
        metadata.insert("header".to_string(), json!("none"));
        let options = CsvOptions::from_metadata("raw", &metadata).unwrap();
        assert_eq!(options, CsvOptions { delimiter: b';', header: false });

        metadata.insert("delimiter".to_string(), json!(";;"));
        assert!(CsvOptions::from_metadata("raw", &metadata).is_err());
    }

    #[test]
    fn batch_reads_and_combines_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.csv");
        let b = tmp.path().join("b.csv");
        fs::write(&a, "id,amount\n1,10\n").unwrap();
        fs::write(&b, "amount,id,note\n30,2,x\n").unwrap();
        let artifact = Artifact::csv("raw", "*.csv").with_combine_strategy(CombineStrategy::UnionByName);
        let payload = CsvAdapter::new().read_many(&[a, b], &artifact, ExecutionMode::Batch, None).unwrap();
        let table = payload.as_table().unwrap();
        assert_eq!(table.columns(), &["id".to_string(), "amount".to_string(), "note".to_string()]);
        assert_eq!(table.rows()[1], vec![json!(2), json!(30), json!("x")]);
        assert_eq!(table.rows()[0][2], Value::Null);
    }

    #[test]
    fn stream_yields_chunks_and_restarts() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.csv");
        let b = tmp.path().join("b.csv");
        fs::write(&a, "id\n1\n2\n3\n").unwrap();
        fs::write(&b, "id\n4\n").unwrap();
        let artifact = Artifact::csv("raw", "*.csv");
        let payload = CsvAdapter::new().read_many(&[a, b], &artifact, ExecutionMode::Stream, Some(2)).unwrap();
        let Payload::Stream(stream) = payload else { panic!("expected stream") };
        let sizes: Vec<usize> = stream.chunks().map(|c| c.unwrap().num_rows()).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
        assert_eq!(stream.collect().unwrap().num_rows(), 4);
    }

    #[test]
    fn stream_rejects_column_drift() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.csv");
        let b = tmp.path().join("b.csv");
        fs::write(&a, "id\n1\n").unwrap();
        fs::write(&b, "key\n2\n").unwrap();
        let payload = CsvAdapter::new().read_many(&[a, b], &Artifact::csv("raw", "*.csv"), ExecutionMode::Stream, None)
                                       .unwrap();
        let err = payload.to_table().unwrap_err();
        assert!(err.to_string().contains("has columns [\"key\"]"), "{err}");
    }

    #[test]
    fn writes_tables_and_rejects_values() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested/out.csv");
        let table = Table::new(vec!["id".into(), "v".into()], vec![vec![json!(1), Value::Null]]).unwrap();
        let rows = CsvAdapter::new().write(&Payload::Table(table), &target, Some("final"), ExecutionMode::Batch, None)
                                    .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "id,v\n1,\n");

        let err = CsvAdapter::new().write(&Payload::Value(json!(1)), &target, Some("final"), ExecutionMode::Batch, None)
                                   .unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported { .. }));
    }
}
