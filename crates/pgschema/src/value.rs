//! Dynamic cell values passed as query parameters and returned in rows.

use crate::error::{OrmError, OrmResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, WrongType, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A single SQL value.
///
/// Integers are widened to `i64` and floats to `f64`; when bound as a
/// parameter the value is narrowed to whatever the server expects for the
/// placeholder (`INT2`, `INT4`, `FLOAT4`, `NUMERIC`, ...).
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Inet(IpAddr),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Human readable kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Numeric(_) => "numeric",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Inet(_) => "inet",
            Value::Array(_) => "array",
        }
    }

    /// Render the value as an SQL literal, for use in `DEFAULT` clauses.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Numeric(v) => v.to_string(),
            Value::Text(v) => quote_literal(v),
            Value::Bytes(v) => {
                let hex: String = v.iter().map(|b| format!("{b:02x}")).collect();
                format!("'\\x{hex}'::bytea")
            }
            Value::Json(v) => format!("{}::jsonb", quote_literal(&v.to_string())),
            Value::Uuid(v) => quote_literal(&v.to_string()),
            Value::Timestamp(v) => quote_literal(&v.to_string()),
            Value::TimestampTz(v) => quote_literal(&v.to_rfc3339()),
            Value::Date(v) => quote_literal(&v.to_string()),
            Value::Time(v) => quote_literal(&v.to_string()),
            Value::Inet(v) => quote_literal(&v.to_string()),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_sql_literal).collect();
                format!("ARRAY[{}]", inner.join(", "))
            }
        }
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Numeric(a), Numeric(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (TimestampTz(a), TimestampTz(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (Inet(a), Inet(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Numeric(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Json(v) => v.to_string().hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::TimestampTz(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Time(v) => v.hash(state),
            Value::Inet(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(v) => f.write_str(v),
            other => f.write_str(&other.to_sql_literal()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Numeric(v) => serializer.serialize_str(&v.to_string()),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::Json(v) => v.serialize(serializer),
            Value::Uuid(v) => v.serialize(serializer),
            Value::Timestamp(v) => v.serialize(serializer),
            Value::TimestampTz(v) => v.serialize(serializer),
            Value::Date(v) => v.serialize(serializer),
            Value::Time(v) => v.serialize(serializer),
            Value::Inet(v) => v.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

fn encode<T: ToSql>(value: &T, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(Box::new(WrongType::new::<T>(ty.clone())));
    }
    value.to_sql(ty, out)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => encode(v, ty, out),
            Value::Int(v) => {
                if *ty == Type::INT2 {
                    encode(&i16::try_from(*v)?, ty, out)
                } else if *ty == Type::INT4 {
                    encode(&i32::try_from(*v)?, ty, out)
                } else if *ty == Type::FLOAT4 {
                    encode(&(*v as f32), ty, out)
                } else if *ty == Type::FLOAT8 {
                    encode(&(*v as f64), ty, out)
                } else if *ty == Type::NUMERIC {
                    encode(&Decimal::from(*v), ty, out)
                } else {
                    encode(v, ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    encode(&(*v as f32), ty, out)
                } else if *ty == Type::NUMERIC {
                    encode(&Decimal::try_from(*v)?, ty, out)
                } else {
                    encode(v, ty, out)
                }
            }
            Value::Numeric(v) => encode(v, ty, out),
            Value::Text(v) => {
                if let Kind::Enum(_) = ty.kind() {
                    // Enum labels travel as their raw text in the binary format.
                    out.extend_from_slice(v.as_bytes());
                    Ok(IsNull::No)
                } else {
                    encode(v, ty, out)
                }
            }
            Value::Bytes(v) => encode(v, ty, out),
            Value::Json(v) => encode(v, ty, out),
            Value::Uuid(v) => encode(v, ty, out),
            Value::Timestamp(v) => encode(v, ty, out),
            Value::TimestampTz(v) => encode(v, ty, out),
            Value::Date(v) => encode(v, ty, out),
            Value::Time(v) => encode(v, ty, out),
            Value::Inet(v) => encode(v, ty, out),
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items.to_sql(ty, out),
                _ => Err(Box::new(WrongType::new::<Vec<Value>>(ty.clone()))),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        match ty.kind() {
            Kind::Enum(_) => return Ok(Value::Text(std::str::from_utf8(raw)?.to_owned())),
            Kind::Array(_) => return Vec::<Value>::from_sql(ty, raw).map(Value::Array),
            _ => {}
        }

        if *ty == Type::BOOL {
            bool::from_sql(ty, raw).map(Value::Bool)
        } else if *ty == Type::INT2 {
            i16::from_sql(ty, raw).map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT4 {
            i32::from_sql(ty, raw).map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT8 {
            i64::from_sql(ty, raw).map(Value::Int)
        } else if *ty == Type::OID {
            u32::from_sql(ty, raw).map(|v| Value::Int(v.into()))
        } else if *ty == Type::FLOAT4 {
            f32::from_sql(ty, raw).map(|v| Value::Float(v.into()))
        } else if *ty == Type::FLOAT8 {
            f64::from_sql(ty, raw).map(Value::Float)
        } else if *ty == Type::NUMERIC {
            Decimal::from_sql(ty, raw).map(Value::Numeric)
        } else if <String as FromSql>::accepts(ty) {
            String::from_sql(ty, raw).map(Value::Text)
        } else if *ty == Type::BYTEA {
            Vec::<u8>::from_sql(ty, raw).map(Value::Bytes)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            serde_json::Value::from_sql(ty, raw).map(Value::Json)
        } else if *ty == Type::UUID {
            Uuid::from_sql(ty, raw).map(Value::Uuid)
        } else if *ty == Type::TIMESTAMP {
            NaiveDateTime::from_sql(ty, raw).map(Value::Timestamp)
        } else if *ty == Type::TIMESTAMPTZ {
            DateTime::<Utc>::from_sql(ty, raw).map(Value::TimestampTz)
        } else if *ty == Type::DATE {
            NaiveDate::from_sql(ty, raw).map(Value::Date)
        } else if *ty == Type::TIME {
            NaiveTime::from_sql(ty, raw).map(Value::Time)
        } else if *ty == Type::INET {
            IpAddr::from_sql(ty, raw).map(Value::Inet)
        } else {
            Err(format!("unsupported column type {}", ty.name()).into())
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Numeric,
    String => Text,
    serde_json::Value => Json,
    Uuid => Uuid,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
    NaiveTime => Time,
    IpAddr => Inet,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
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

/// Conversion out of a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> OrmResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> OrmError {
    OrmError::Other(format!(
        "expected {expected} value, found {}",
        value.kind_name()
    ))
}

impl FromValue for Value {
    fn from_value(value: Value) -> OrmResult<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> OrmResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("int", &value))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> OrmResult<Self> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|e| OrmError::Other(e.to_string()))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> OrmResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> OrmResult<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}
