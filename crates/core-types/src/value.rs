use crate::error::CoreError;
use crate::sql_type::SqlType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// A single column value, as written to or read from PostgreSQL.
///
/// Every variant has a fixed column type (see [`Value::sql_type`]), which is
/// what the automatic schema uses when it has to create a column.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(JsonValue),
    /// A one-dimensional array of bools, ints, floats or text. Nulls are allowed.
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short, stable name for the variant. Used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Decimal(_) => "decimal",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
        }
    }

    /// Infers the column type for this value.
    ///
    /// `Null` carries no type information and falls back to `text`, as does an
    /// array holding nothing but nulls.
    pub fn sql_type(&self) -> Result<SqlType, CoreError> {
        Ok(match self {
            Value::Null | Value::Text(_) => SqlType::Text,
            Value::Bool(_) => SqlType::Bool,
            Value::Int(_) => SqlType::BigInt,
            Value::Float(_) => SqlType::Float8,
            Value::Bytes(_) => SqlType::Bytea,
            Value::Decimal(_) => SqlType::Numeric,
            Value::Uuid(_) => SqlType::Uuid,
            Value::Date(_) => SqlType::Date,
            Value::Time(_) => SqlType::Time,
            Value::Timestamp(_) => SqlType::Timestamp,
            Value::TimestampTz(_) => SqlType::TimestampTz,
            Value::Json(_) => SqlType::Jsonb,
            Value::Array(items) => SqlType::Array(Box::new(element_type(items)?)),
        })
    }

    /// Converts a JSON document into a value.
    ///
    /// Integers that fit in an `i64` become `Int`, every other number becomes
    /// `Float`. Arrays are converted element by element; objects are kept
    /// whole as `Json`.
    pub fn from_json(json: JsonValue) -> Result<Value, CoreError> {
        Ok(match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(
                    n.as_f64()
                        .ok_or_else(|| CoreError::InvalidNumber(n.to_string()))?,
                ),
            },
            JsonValue::String(s) => Value::Text(s),
            JsonValue::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            object @ JsonValue::Object(_) => Value::Json(object),
        })
    }

    /// Renders the value as JSON for output.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Bytes(bytes) => JsonValue::String(hex_literal(bytes)),
            Value::Decimal(d) => JsonValue::String(d.to_string()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::Date(d) => JsonValue::String(d.to_string()),
            Value::Time(t) => JsonValue::String(t.to_string()),
            Value::Timestamp(ts) => {
                JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Value::TimestampTz(ts) => JsonValue::String(ts.to_rfc3339()),
            Value::Json(json) => json.clone(),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

/// Element type of an array: the type of its first non-null element.
pub(crate) fn element_type(items: &[Value]) -> Result<SqlType, CoreError> {
    let mut first: Option<&Value> = None;
    for item in items {
        match item {
            Value::Null => continue,
            Value::Array(_) => return Err(CoreError::NestedArray),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) => {}
            other => return Err(CoreError::UnsupportedArrayElement(other.type_name())),
        }
        match first {
            None => first = Some(item),
            Some(seen) if std::mem::discriminant(seen) != std::mem::discriminant(item) => {
                return Err(CoreError::MixedArray {
                    first: seen.type_name(),
                    other: item.type_name(),
                });
            }
            Some(_) => {}
        }
    }
    first.map_or(Ok(SqlType::Text), Value::sql_type)
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(bytes) => f.write_str(&hex_literal(bytes)),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::TimestampTz(ts) => write!(f, "{ts}"),
            Value::Json(json) => write!(f, "{json}"),
            Value::Array(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// --- Conversions from host types ---

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

impl_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    Decimal => Decimal,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    JsonValue => Json,
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(items: Vec<$ty>) -> Self {
                    Value::Array(items.into_iter().map(Value::from).collect())
                }
            }
        )+
    };
}

impl_from_vec!(bool, i32, i64, f64, String, &str);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
