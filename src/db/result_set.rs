use std::collections::{HashMap, HashSet};

use serde_json::Value as JsonValue;
use tokio_postgres::Row;

use crate::document::Entry;
use crate::error::Error;
use crate::schema::{PgType, Schema, Table, PK_COLUMN};

/// Rows of a wide select, split back into per-table entries.
///
/// A `left join` chain multiplies rows: every one-to-many child row repeats
/// the parent side. Distinctness is restored by remembering the set of seen
/// primary keys per table, so each id contributes exactly one entry, in the
/// order the database returned it.
#[derive(Debug, Default)]
pub struct ResultSet {
    data: HashMap<String, Vec<Entry>>,
}

impl ResultSet {
    /// Splits driver rows by their `"hint.column"` aliases.
    pub fn from_rows(schema: &Schema, rows: &[Row]) -> Result<Self, Error> {
        let column_names: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let matrix = rows
            .iter()
            .map(|row| row_values(schema, row))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_matrix(schema, &column_names, matrix)
    }

    /// Builds a result set from an already-decoded value matrix. This is the
    /// splitting and deduplication core; `from_rows` layers driver decoding
    /// on top of it.
    pub fn from_matrix(
        schema: &Schema,
        column_names: &[String],
        matrix: Vec<Vec<JsonValue>>,
    ) -> Result<Self, Error> {
        let mut data: HashMap<String, Vec<Entry>> = HashMap::new();
        let mut seen: HashMap<String, HashSet<i64>> = HashMap::new();

        for row in matrix {
            if row.len() != column_names.len() {
                return Err(Error::internal(
                    "row width differs from the select column list",
                ));
            }

            // split the wide row into one entry per participating table
            let mut entries: HashMap<&str, Entry> = HashMap::new();
            for (name, value) in column_names.iter().zip(row) {
                let (hint, column) = name.split_once('.').ok_or_else(|| {
                    Error::internal(format!("result column '{name}' lacks a table hint"))
                })?;
                entries
                    .entry(hint)
                    .or_default()
                    .insert(column.to_string(), value);
            }

            for table in schema.tables() {
                let Some(entry) = entries.remove(table.hint.as_str()) else {
                    continue;
                };
                // a NULL id means the joined table had no row here
                let Some(pk) = entry.get(PK_COLUMN).and_then(JsonValue::as_i64) else {
                    continue;
                };
                if seen.entry(table.name.clone()).or_default().insert(pk) {
                    data.entry(table.name.clone()).or_default().push(entry);
                }
            }
        }
        Ok(Self { data })
    }

    /// Entries of `table` whose `column` equals `value`; empty when the
    /// table contributed no rows.
    pub fn get(&self, table: &str, column: &str, value: &JsonValue) -> Vec<&Entry> {
        self.data
            .get(table)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.get(column) == Some(value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The single entry of `table` with primary key `pk`.
    pub fn get_pk(&self, table: &str, pk: i64) -> Result<&Entry, Error> {
        let matches = self.get(table, PK_COLUMN, &JsonValue::from(pk));
        match matches.as_slice() {
            [] => Err(Error::NoRowForPrimaryKey {
                table: table.to_string(),
                pk,
            }),
            [entry] => Ok(*entry),
            _ => Err(Error::AmbiguousPrimaryKey {
                table: table.to_string(),
                pk,
            }),
        }
    }

    /// Projects an entry onto the given columns, dropping SQL NULLs.
    pub fn strip(entry: &Entry, columns: &[String]) -> Entry {
        let mut stripped = Entry::new();
        for column in columns {
            match entry.get(column) {
                Some(value) if !value.is_null() => {
                    stripped.insert(column.clone(), value.clone());
                }
                _ => {}
            }
        }
        stripped
    }

    /// All values of `column` across the entries of `table`, preserving
    /// insertion order.
    pub fn get_column(&self, table: &str, column: &str) -> Vec<JsonValue> {
        self.data
            .get(table)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get(column).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Decodes one driver row into JSON values, using the schema's column
/// metadata to pick the native decoder for each aliased column.
pub(crate) fn row_values(schema: &Schema, row: &Row) -> Result<Vec<JsonValue>, Error> {
    let tables_by_hint: HashMap<&str, &Table> = schema
        .tables()
        .iter()
        .map(|t| (t.hint.as_str(), t))
        .collect();

    let mut values = Vec::with_capacity(row.len());
    for (index, result_column) in row.columns().iter().enumerate() {
        let name = result_column.name();
        let (hint, column_name) = name
            .split_once('.')
            .ok_or_else(|| Error::internal(format!("result column '{name}' lacks a table hint")))?;
        let table = tables_by_hint
            .get(hint)
            .ok_or_else(|| Error::internal(format!("no table with hint '{hint}'")))?;
        let column = table
            .get_column(column_name)
            .ok_or_else(|| Error::internal(format!("no column '{column_name}' in '{}'", table.name)))?;
        values.push(decode(row, index, &column.pg_type)?);
    }
    Ok(values)
}

fn decode(row: &Row, index: usize, pg_type: &PgType) -> Result<JsonValue, Error> {
    let value = match pg_type {
        PgType::Integer => row.try_get::<_, Option<i32>>(index)?.map(JsonValue::from),
        PgType::BigInt | PgType::Serial8 | PgType::BigSerial => {
            row.try_get::<_, Option<i64>>(index)?.map(JsonValue::from)
        }
        PgType::Real => row
            .try_get::<_, Option<f32>>(index)?
            .map(|v| JsonValue::from(v as f64)),
        PgType::Double => row.try_get::<_, Option<f64>>(index)?.map(JsonValue::from),
        PgType::Text => row.try_get::<_, Option<String>>(index)?.map(JsonValue::from),
        PgType::Boolean => row.try_get::<_, Option<bool>>(index)?.map(JsonValue::from),
        PgType::Jsonb => row.try_get::<_, Option<JsonValue>>(index)?,
        PgType::Array { base, .. } => decode_array(row, index, base)?,
    };
    Ok(value.unwrap_or(JsonValue::Null))
}

fn decode_array(row: &Row, index: usize, base: &PgType) -> Result<Option<JsonValue>, Error> {
    let value = match base {
        PgType::Integer => row
            .try_get::<_, Option<Vec<i32>>>(index)?
            .map(JsonValue::from),
        PgType::BigInt => row
            .try_get::<_, Option<Vec<i64>>>(index)?
            .map(JsonValue::from),
        PgType::Real => row
            .try_get::<_, Option<Vec<f32>>>(index)?
            .map(|v| JsonValue::from(v.into_iter().map(|f| f as f64).collect::<Vec<_>>())),
        PgType::Double => row
            .try_get::<_, Option<Vec<f64>>>(index)?
            .map(JsonValue::from),
        PgType::Boolean => row
            .try_get::<_, Option<Vec<bool>>>(index)?
            .map(JsonValue::from),
        _ => row
            .try_get::<_, Option<Vec<String>>>(index)?
            .map(JsonValue::from),
    };
    Ok(value)
}
