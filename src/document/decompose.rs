//! Decomposition of a nested document into per-table insert rows.
//!
//! Each table's rows are located by walking the table's path through the
//! document, splitting on every prefix that names a one-to-many table: those
//! prefixes navigate arrays (one row per element) or key-value maps (one row
//! per pair), everything else navigates plain objects. Row arguments follow
//! the table's column order, skipping the primary key and foreign-key slots
//! (the writer fills those from its primary-key cache).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::db::params::SqlParam;
use crate::error::Error;
use crate::schema::{Column, PgType, Schema, Table};

use super::{nested_value, Entry};

/// Insert rows per table name, in the schema's table order.
pub type MappedMatrix = BTreeMap<String, Vec<Vec<SqlParam>>>;

/// Decomposes `document` into the row matrix the writer executes.
pub fn decompose(schema: &Schema, document: &Value) -> Result<MappedMatrix, Error> {
    let root = document
        .as_object()
        .ok_or_else(|| Error::decomposition(&[], "document is not an object"))?;

    let mut matrix = MappedMatrix::new();
    for table in schema.tables() {
        let subtrees: Vec<&Entry> = if table.path.is_empty() {
            vec![root]
        } else {
            extract_subtrees(schema, document, &table.path)?
        };

        let mut rows = Vec::new();
        for subtree in subtrees {
            if table.kv {
                rows.extend(kv_rows(table, subtree)?);
            } else {
                rows.push(row_params(table, subtree)?);
            }
        }
        if !rows.is_empty() {
            matrix.insert(table.name.clone(), rows);
        }
    }
    Ok(matrix)
}

/// Splits `path` into groups ending at each one-to-many prefix; the final
/// group is whatever remains. Groups after the first are relative to the
/// array elements (or map) the previous group navigated into.
fn decompose_paths(schema: &Schema, path: &[String]) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut prefix = Vec::new();
    for segment in path {
        current.push(segment.clone());
        prefix.push(segment.clone());
        if schema.has_one_to_many(&prefix) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// All subtrees of `document` that produce rows for the table at `path`.
/// Absent optional subtrees simply contribute no rows.
fn extract_subtrees<'a>(
    schema: &Schema,
    document: &'a Value,
    path: &[String],
) -> Result<Vec<&'a Entry>, Error> {
    let groups = decompose_paths(schema, path);
    let mut subtrees = Vec::new();
    collect(schema, document, &groups, Vec::new(), &mut subtrees)?;
    Ok(subtrees)
}

fn collect<'a>(
    schema: &Schema,
    value: &'a Value,
    groups: &[Vec<String>],
    walked: Vec<String>,
    subtrees: &mut Vec<&'a Entry>,
) -> Result<(), Error> {
    let Some((group, rest)) = groups.split_first() else {
        let object = value
            .as_object()
            .ok_or_else(|| Error::decomposition(&walked, "expected an object"))?;
        subtrees.push(object);
        return Ok(());
    };

    let mut walked = walked;
    walked.extend(group.iter().cloned());
    let Some(next) = nested_value(value, group) else {
        return Ok(());
    };

    if schema.has_one_to_many(&walked) && !schema.is_kv(&walked) {
        let items = next
            .as_array()
            .ok_or_else(|| Error::decomposition(&walked, "expected an array"))?;
        for item in items {
            if rest.is_empty() {
                subtrees.push(
                    item.as_object()
                        .ok_or_else(|| Error::decomposition(&walked, "array items must be objects"))?,
                );
            } else {
                collect(schema, item, rest, walked.clone(), subtrees)?;
            }
        }
        Ok(())
    } else if rest.is_empty() {
        subtrees.push(
            next.as_object()
                .ok_or_else(|| Error::decomposition(&walked, "expected an object"))?,
        );
        Ok(())
    } else {
        collect(schema, next, rest, walked, subtrees)
    }
}

/// One argument list for a non-KV table row, in column order.
fn row_params(table: &Table, subtree: &Entry) -> Result<Vec<SqlParam>, Error> {
    let mut params = Vec::new();
    for column in &table.columns {
        if table.is_primary_key(&column.name) || table.is_foreign_key(&column.name) {
            continue;
        }
        // the embedded-resource column stores the whole subtree
        if column.pg_type == PgType::Jsonb {
            params.push(SqlParam::Json(Some(Value::Object(subtree.clone()))));
            continue;
        }

        let mut path = table.path.clone();
        path.push(column.name.clone());
        match subtree.get(&column.name) {
            Some(value) if !value.is_null() => params.push(scalar_param(column, &path, value)?),
            _ if column.not_null => {
                return Err(Error::decomposition(&path, "required field is missing"))
            }
            _ => params.push(SqlParam::null_for(&column.pg_type)),
        }
    }
    Ok(params)
}

/// One `(key, value)` argument list per map entry, in map iteration order.
fn kv_rows(table: &Table, subtree: &Entry) -> Result<Vec<Vec<SqlParam>>, Error> {
    let value_column = table
        .get_column("value")
        .ok_or_else(|| Error::internal(format!("key-value table '{}' lacks a value column", table.name)))?;
    subtree
        .iter()
        .map(|(key, value)| {
            let mut path = table.path.clone();
            path.push(key.clone());
            Ok(vec![
                SqlParam::Text(Some(key.clone())),
                scalar_param(value_column, &path, value)?,
            ])
        })
        .collect()
}

fn scalar_param(column: &Column, path: &[String], value: &Value) -> Result<SqlParam, Error> {
    let mismatch = |expected: &str| {
        Error::decomposition(path, format!("expected {expected}, got '{value}'"))
    };
    match &column.pg_type {
        PgType::Text => Ok(SqlParam::Text(Some(
            value.as_str().ok_or_else(|| mismatch("a string"))?.to_string(),
        ))),
        PgType::Integer => {
            let wide = value.as_i64().ok_or_else(|| mismatch("an integer"))?;
            let narrow = i32::try_from(wide)
                .map_err(|_| Error::decomposition(path, "integer out of 32-bit range"))?;
            Ok(SqlParam::Int(Some(narrow)))
        }
        PgType::BigInt => Ok(SqlParam::BigInt(Some(
            value.as_i64().ok_or_else(|| mismatch("an integer"))?,
        ))),
        PgType::Real => Ok(SqlParam::Real(Some(
            value.as_f64().ok_or_else(|| mismatch("a number"))? as f32,
        ))),
        PgType::Double => Ok(SqlParam::Double(Some(
            value.as_f64().ok_or_else(|| mismatch("a number"))?,
        ))),
        PgType::Boolean => Ok(SqlParam::Bool(Some(
            value.as_bool().ok_or_else(|| mismatch("a boolean"))?,
        ))),
        PgType::Jsonb => Ok(SqlParam::Json(Some(value.clone()))),
        PgType::Array { base, .. } => array_param(base, path, value),
        PgType::Serial8 | PgType::BigSerial => Err(Error::internal(format!(
            "column '{}' cannot be bound from a document",
            column.name
        ))),
    }
}

fn array_param(base: &PgType, path: &[String], value: &Value) -> Result<SqlParam, Error> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::decomposition(path, format!("expected an array, got '{value}'")))?;
    let mismatch =
        |expected: &str| Error::decomposition(path, format!("array items must be {expected}"));
    match base {
        PgType::Text => {
            let converted = items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or_else(|| mismatch("strings")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlParam::TextArray(Some(converted)))
        }
        PgType::Integer => {
            let converted = items
                .iter()
                .map(|v| {
                    v.as_i64()
                        .and_then(|w| i32::try_from(w).ok())
                        .ok_or_else(|| mismatch("32-bit integers"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlParam::IntArray(Some(converted)))
        }
        PgType::BigInt => {
            let converted = items
                .iter()
                .map(|v| v.as_i64().ok_or_else(|| mismatch("integers")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlParam::BigIntArray(Some(converted)))
        }
        PgType::Real => {
            let converted = items
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| mismatch("numbers")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlParam::RealArray(Some(converted)))
        }
        PgType::Double => {
            let converted = items
                .iter()
                .map(|v| v.as_f64().ok_or_else(|| mismatch("numbers")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlParam::DoubleArray(Some(converted)))
        }
        PgType::Boolean => {
            let converted = items
                .iter()
                .map(|v| v.as_bool().ok_or_else(|| mismatch("booleans")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlParam::BoolArray(Some(converted)))
        }
        _ => Err(Error::decomposition(path, "unsupported array item type")),
    }
}
