//! Validación de una tabla contra el schema declarado de su artifact.
//! Siempre fatal: un schema incumplido no admite modo `warn`.
use trakt_core::{ArtifactSchema, ColumnType, SchemaError, Table};

pub fn validate_table_schema(artifact: &str, origin: &str, table: &Table, schema: &ArtifactSchema) -> Result<(), SchemaError> {
    let actual: Vec<String> = table.columns().to_vec();

    if let Some(expected) = &schema.columns {
        if *expected != actual {
            return Err(SchemaError::ColumnsMismatch { artifact: artifact.to_string(),
                                                      origin: origin.to_string(),
                                                      expected: expected.clone(),
                                                      got: actual });
        }
    } else if let Some(dtypes) = &schema.dtypes {
        let missing: Vec<String> = dtypes.keys().filter(|c| !actual.contains(c)).cloned().collect();
        let extra: Vec<String> = actual.iter().filter(|c| !dtypes.contains_key(*c)).cloned().collect();
        if !missing.is_empty() || !extra.is_empty() {
            return Err(SchemaError::MissingExtra { artifact: artifact.to_string(),
                                                   origin: origin.to_string(),
                                                   missing,
                                                   extra });
        }
    }

    if let Some(dtypes) = &schema.dtypes {
        for (column, expected) in dtypes {
            let got = table.column_type(column).unwrap_or(ColumnType::Null);
            if got != *expected {
                return Err(SchemaError::DtypeMismatch { artifact: artifact.to_string(),
                                                        origin: origin.to_string(),
                                                        column: column.clone(),
                                                        expected: expected.to_string(),
                                                        got: got.to_string() });
            }
        }
    }
    Ok(())
}
