//! Conversion between [`Value`] and the PostgreSQL driver.
//!
//! Encoding and decoding themselves are done by `sqlx`; this module only picks
//! the concrete Rust type that matches each value or column.

use crate::error::CoreError;
use crate::record::{Fields, Record};
use crate::sql_type::SqlType;
use crate::value::{element_type, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Decode, Encode, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// A NULL parameter sent with an unspecified type (OID 0), so the server
/// infers it from the context it is used in, like a bare `NULL` literal.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Binds `value` as the next positional parameter of `query`.
pub fn bind<'q>(query: PgQuery<'q>, value: Value) -> Result<PgQuery<'q>, CoreError> {
    Ok(match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Float(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Bytes(v) => query.bind(v),
        Value::Decimal(v) => query.bind(v),
        Value::Uuid(v) => query.bind(v),
        Value::Date(v) => query.bind(v),
        Value::Time(v) => query.bind(v),
        Value::Timestamp(v) => query.bind(v),
        Value::TimestampTz(v) => query.bind(v),
        Value::Json(v) => query.bind(sqlx::types::Json(v)),
        Value::Array(items) => bind_array(query, items)?,
    })
}

fn bind_array<'q>(query: PgQuery<'q>, items: Vec<Value>) -> Result<PgQuery<'q>, CoreError> {
    Ok(match element_type(&items)? {
        SqlType::Bool => query.bind(collect(items, |v| match v {
            Value::Bool(b) => Some(b),
            _ => None,
        })),
        SqlType::BigInt => query.bind(collect(items, |v| match v {
            Value::Int(i) => Some(i),
            _ => None,
        })),
        SqlType::Float8 => query.bind(collect(items, |v| match v {
            Value::Float(f) => Some(f),
            _ => None,
        })),
        SqlType::Text => query.bind(collect(items, |v| match v {
            Value::Text(s) => Some(s),
            _ => None,
        })),
        other => return Err(CoreError::UnsupportedType(format!("{other}[]"))),
    })
}

fn collect<T>(items: Vec<Value>, unwrap: impl Fn(Value) -> Option<T>) -> Vec<Option<T>> {
    items.into_iter().map(unwrap).collect()
}

/// Decodes every column of `row` by its PostgreSQL type.
pub fn decode_row(row: &PgRow) -> Result<Record, CoreError> {
    let mut values = Fields::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.name(), column.type_info().name())?;
        values.insert(column.name().to_string(), value);
    }
    Ok(Record::from(values))
}

fn decode_column(
    row: &PgRow,
    index: usize,
    column: &str,
    type_name: &str,
) -> Result<Value, CoreError> {
    let raw = row.try_get_raw(index).map_err(|source| CoreError::Decode {
        column: column.to_string(),
        source,
    })?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name.to_ascii_uppercase().as_str() {
        "BOOL" => Value::Bool(get(row, index, column)?),
        "INT2" => Value::Int(get::<i16>(row, index, column)?.into()),
        "INT4" => Value::Int(get::<i32>(row, index, column)?.into()),
        "INT8" => Value::Int(get(row, index, column)?),
        "FLOAT4" => Value::Float(get::<f32>(row, index, column)?.into()),
        "FLOAT8" => Value::Float(get(row, index, column)?),
        "NUMERIC" => Value::Decimal(get::<Decimal>(row, index, column)?),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            Value::Text(get(row, index, column)?)
        }
        "BYTEA" => Value::Bytes(get(row, index, column)?),
        "UUID" => Value::Uuid(get::<Uuid>(row, index, column)?),
        "DATE" => Value::Date(get::<NaiveDate>(row, index, column)?),
        "TIME" => Value::Time(get::<NaiveTime>(row, index, column)?),
        "TIMESTAMP" => Value::Timestamp(get::<NaiveDateTime>(row, index, column)?),
        "TIMESTAMPTZ" => Value::TimestampTz(get::<DateTime<Utc>>(row, index, column)?),
        "JSON" | "JSONB" => Value::Json(get::<JsonValue>(row, index, column)?),
        "BOOL[]" => array::<bool>(row, index, column, Value::Bool)?,
        "INT2[]" => array::<i16>(row, index, column, |v| Value::Int(v.into()))?,
        "INT4[]" => array::<i32>(row, index, column, |v| Value::Int(v.into()))?,
        "INT8[]" => array::<i64>(row, index, column, Value::Int)?,
        "FLOAT4[]" => array::<f32>(row, index, column, |v| Value::Float(v.into()))?,
        "FLOAT8[]" => array::<f64>(row, index, column, Value::Float)?,
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "BPCHAR[]" | "NAME[]" => {
            array::<String>(row, index, column, Value::Text)?
        }
        _ => match row.try_get::<String, _>(index) {
            Ok(text) => Value::Text(text),
            Err(e) => {
                tracing::warn!(column, type_name, error = %e, "No conversion for column type.");
                return Err(CoreError::UnsupportedType(type_name.to_string()));
            }
        },
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow, index: usize, column: &str) -> Result<T, CoreError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(index).map_err(|source| CoreError::Decode {
        column: column.to_string(),
        source,
    })
}

fn array<'r, T>(
    row: &'r PgRow,
    index: usize,
    column: &str,
    wrap: impl Fn(T) -> Value,
) -> Result<Value, CoreError>
where
    Vec<Option<T>>: Decode<'r, Postgres> + Type<Postgres>,
{
    let items: Vec<Option<T>> = get(row, index, column)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, &wrap))
            .collect(),
    ))
}
