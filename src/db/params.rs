use bytes::BytesMut;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::schema::PgType;

/// A typed bind value.
///
/// The document shape is only known at runtime, so every bound value carries
/// its own SQL type. NULLs included: they must be typed to match the column
/// they are bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(Option<i32>),
    BigInt(Option<i64>),
    Real(Option<f32>),
    Double(Option<f64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Json(Option<JsonValue>),
    IntArray(Option<Vec<i32>>),
    BigIntArray(Option<Vec<i64>>),
    RealArray(Option<Vec<f32>>),
    DoubleArray(Option<Vec<f64>>),
    TextArray(Option<Vec<String>>),
    BoolArray(Option<Vec<bool>>),
}

impl SqlParam {
    /// The typed NULL for a column type.
    pub fn null_for(pg_type: &PgType) -> SqlParam {
        match pg_type {
            PgType::Integer => Self::Int(None),
            PgType::BigInt | PgType::Serial8 | PgType::BigSerial => Self::BigInt(None),
            PgType::Real => Self::Real(None),
            PgType::Double => Self::Double(None),
            PgType::Text => Self::Text(None),
            PgType::Boolean => Self::Bool(None),
            PgType::Jsonb => Self::Json(None),
            PgType::Array { base, .. } => match base.as_ref() {
                PgType::Integer => Self::IntArray(None),
                PgType::BigInt | PgType::Serial8 | PgType::BigSerial => Self::BigIntArray(None),
                PgType::Real => Self::RealArray(None),
                PgType::Double => Self::DoubleArray(None),
                PgType::Boolean => Self::BoolArray(None),
                _ => Self::TextArray(None),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Int(v) => v.is_none(),
            Self::BigInt(v) => v.is_none(),
            Self::Real(v) => v.is_none(),
            Self::Double(v) => v.is_none(),
            Self::Text(v) => v.is_none(),
            Self::Bool(v) => v.is_none(),
            Self::Json(v) => v.is_none(),
            Self::IntArray(v) => v.is_none(),
            Self::BigIntArray(v) => v.is_none(),
            Self::RealArray(v) => v.is_none(),
            Self::DoubleArray(v) => v.is_none(),
            Self::TextArray(v) => v.is_none(),
            Self::BoolArray(v) => v.is_none(),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Int(v) => v.to_sql(ty, out),
            Self::BigInt(v) => v.to_sql(ty, out),
            Self::Real(v) => v.to_sql(ty, out),
            Self::Double(v) => v.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Json(v) => v.to_sql(ty, out),
            Self::IntArray(v) => v.to_sql(ty, out),
            Self::BigIntArray(v) => v.to_sql(ty, out),
            Self::RealArray(v) => v.to_sql(ty, out),
            Self::DoubleArray(v) => v.to_sql(ty, out),
            Self::TextArray(v) => v.to_sql(ty, out),
            Self::BoolArray(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        // the decomposer already matched each value to its column type
        true
    }

    to_sql_checked!();
}
