//! Bound parameter and result cell values.
//!
//! Every value that crosses the core boundary (builder input, compiled
//! parameter list, driver row cell) is a [`Value`]. Keeping the parameter list
//! inspectable is what lets compiled queries be compared, cached and snapshot
//! tested; the tokio-postgres adapter converts at the wire through [`ToSql`].

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::{PgError, PgResult};

/// A single SQL value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
        }
    }

    /// Render a primitive as literal SQL text.
    ///
    /// Text is emitted verbatim: this is only reachable through
    /// [`crate::raw::Unsafe`], where the caller vouches for the content.
    pub(crate) fn to_literal(&self) -> Option<String> {
        match self {
            Value::Null => Some("NULL".to_string()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) if f.is_finite() => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Read column `idx` of a tokio-postgres row.
    pub(crate) fn from_pg_row(row: &tokio_postgres::Row, idx: usize) -> PgResult<Value> {
        let column = &row.columns()[idx];
        let ty = column.type_();

        let value = if *ty == Type::BOOL {
            opt::<bool>(row, idx)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            opt::<i16>(row, idx)?.map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT4 {
            opt::<i32>(row, idx)?.map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT8 {
            opt::<i64>(row, idx)?.map(Value::Int)
        } else if *ty == Type::FLOAT4 {
            opt::<f32>(row, idx)?.map(|v| Value::Float(v.into()))
        } else if *ty == Type::FLOAT8 {
            opt::<f64>(row, idx)?.map(Value::Float)
        } else if *ty == Type::BYTEA {
            opt::<Vec<u8>>(row, idx)?.map(Value::Bytes)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            opt::<serde_json::Value>(row, idx)?.map(Value::Json)
        } else if *ty == Type::UUID {
            opt::<Uuid>(row, idx)?.map(Value::Uuid)
        } else if *ty == Type::TIMESTAMPTZ {
            opt::<DateTime<Utc>>(row, idx)?.map(Value::Timestamp)
        } else if *ty == Type::TIMESTAMP {
            opt::<NaiveDateTime>(row, idx)?.map(|v| Value::Timestamp(v.and_utc()))
        } else if *ty == Type::INT4_ARRAY {
            opt::<Vec<i32>>(row, idx)?
                .map(|v| Value::Array(v.into_iter().map(|i| Value::Int(i.into())).collect()))
        } else if *ty == Type::INT8_ARRAY {
            opt::<Vec<i64>>(row, idx)?.map(|v| Value::Array(v.into_iter().map(Value::Int).collect()))
        } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
            opt::<Vec<String>>(row, idx)?.map(|v| Value::Array(v.into_iter().map(Value::Text).collect()))
        } else {
            // TEXT, VARCHAR, BPCHAR, NAME and anything else with a textual form
            opt::<String>(row, idx)?.map(Value::Text)
        };

        Ok(value.unwrap_or(Value::Null))
    }
}

fn opt<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> PgResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| PgError::decode(row.columns()[idx].name(), e.to_string()))
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) if *ty == Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
            Value::Int(i) if *ty == Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
            Value::Int(i) if *ty == Type::FLOAT8 => (*i as f64).to_sql(ty, out),
            Value::Int(i) => i.to_sql(ty, out),
            Value::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql(ty, out),
            Value::Float(f) => f.to_sql(ty, out),
            Value::Text(s) => s.to_sql(ty, out),
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Json(j) => j.to_sql(ty, out),
            Value::Uuid(u) => u.to_sql(ty, out),
            Value::Timestamp(t) if *ty == Type::TIMESTAMP => t.naive_utc().to_sql(ty, out),
            Value::Timestamp(t) => t.to_sql(ty, out),
            Value::Array(items) => items.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Text,
    serde_json::Value => Json,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Conversion from a result cell into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch<T>(expected: &str, got: &Value) -> Result<T, String> {
    Err(format!("expected {expected}, got {}", got.type_name()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => mismatch("bool", other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            // COUNT(*) and friends come back as numeric text from some drivers
            Value::Text(s) => s.parse().map_err(|_| format!("expected int, got text '{s}'")),
            other => mismatch("int", other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| format!("{wide} does not fit in i32"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => mismatch("float", other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => mismatch("text", other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            other => serde_json::to_value(other).map_err(|e| e.to_string()),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s).map_err(|e| e.to_string()),
            other => mismatch("uuid", other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(t) => Ok(*t),
            other => mismatch("timestamp", other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => mismatch("array", other),
        }
    }
}
