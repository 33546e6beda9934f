use std::fmt;

use crate::error::Error;
use crate::jsonschema::JsonType;

/// PostgreSQL column types the engine emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgType {
    Integer,
    BigInt,
    Real,
    Double,
    Text,
    Boolean,
    /// Auto-incrementing bigint primary key of object tables.
    Serial8,
    /// Auto-incrementing bigint primary key of one-to-many child tables.
    BigSerial,
    Jsonb,
    /// Scalar array; `max_items` bounds the dimension when known.
    Array {
        base: Box<PgType>,
        max_items: Option<i64>,
    },
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::BigInt => f.write_str("bigint"),
            Self::Real => f.write_str("real"),
            Self::Double => f.write_str("double precision"),
            Self::Text => f.write_str("text"),
            Self::Boolean => f.write_str("boolean"),
            Self::Serial8 => f.write_str("serial8"),
            Self::BigSerial => f.write_str("bigserial"),
            Self::Jsonb => f.write_str("jsonb"),
            Self::Array { base, max_items } => match max_items {
                Some(max) => write!(f, "{base}[{max}]"),
                None => write!(f, "{base}[]"),
            },
        }
    }
}

fn format_type(format: &str) -> Option<PgType> {
    match format {
        "int32" => Some(PgType::Integer),
        "int64" => Some(PgType::BigInt),
        "float" => Some(PgType::Real),
        "double" => Some(PgType::Double),
        "byte" | "binary" | "date-time" => Some(PgType::Text),
        _ => None,
    }
}

fn json_type_default(json_type: JsonType) -> Option<PgType> {
    match json_type {
        JsonType::Integer => Some(PgType::Integer),
        JsonType::Number => Some(PgType::Real),
        JsonType::String => Some(PgType::Text),
        JsonType::Boolean => Some(PgType::Boolean),
        JsonType::Array | JsonType::Object => None,
    }
}

/// Maps `(jsonType, format)` onto a column type; the format wins when
/// present. A pure function: the only failure is an unmappable pair, which
/// surfaces as a synthesis error at `path`.
pub fn column_type(
    path: &[String],
    json_type: JsonType,
    format: Option<&str>,
) -> Result<PgType, Error> {
    match format.filter(|f| !f.is_empty()) {
        Some(format) => format_type(format).ok_or_else(|| {
            Error::synthesis(
                path,
                format!("no column type for type '{json_type}' with format '{format}'"),
            )
        }),
        None => json_type_default(json_type).ok_or_else(|| {
            Error::synthesis(path, format!("no column type for type '{json_type}'"))
        }),
    }
}

/// A table column.
///
/// `source_type` is kept separately from the rendered SQL type because
/// decomposition and assembly dispatch on it; scalar-array columns keep
/// their element type inside [`PgType::Array`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub pg_type: PgType,
    pub source_type: JsonType,
    pub not_null: bool,
}

impl Column {
    /// A scalar column mapped from a JSON type and optional format.
    pub fn new(
        path: &[String],
        name: &str,
        json_type: JsonType,
        format: Option<&str>,
        not_null: bool,
    ) -> Result<Self, Error> {
        Ok(Self {
            name: name.to_string(),
            pg_type: column_type(path, json_type, format)?,
            source_type: json_type,
            not_null,
        })
    }

    /// A scalar-array column; the base type is mapped from the item type and
    /// format, `max_items` bounds the dimension when known.
    pub fn new_array(
        path: &[String],
        name: &str,
        item_type: JsonType,
        format: Option<&str>,
        max_items: Option<i64>,
        not_null: bool,
    ) -> Result<Self, Error> {
        let base = column_type(path, item_type, format)?;
        Ok(Self {
            name: name.to_string(),
            pg_type: PgType::Array {
                base: Box::new(base),
                max_items,
            },
            source_type: JsonType::Array,
            not_null,
        })
    }

    /// A column with an explicit SQL type, used for primary keys, foreign
    /// keys, and the embedded-resource document column.
    pub(crate) fn raw(name: &str, pg_type: PgType, source_type: JsonType, not_null: bool) -> Self {
        Self {
            name: name.to_string(),
            pg_type,
            source_type,
            not_null,
        }
    }

    /// The column definition clause of a `CREATE TABLE` statement.
    pub fn render(&self) -> String {
        let mut clause = format!("\"{}\" {}", self.name, self.pg_type);
        if self.not_null {
            clause.push_str(" not null");
        }
        clause
    }
}
