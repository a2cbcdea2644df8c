//! Row decoding into JSON objects

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgColumn, PgRow, Postgres};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Column, Decode, Row as _, TypeInfo, ValueRef};

use super::bind::MONEY_SCALE;
use super::wire::{Wire, format_bytea, format_interval, format_network};
use crate::error::{AccessorError, Result};
use crate::types::Row;

/// Decode every column of a row, keyed by column name
///
/// Fails on the first non-null value whose type has no JSON representation.
pub(crate) fn row_to_json(row: &PgRow) -> Result<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column)?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, column: &PgColumn) -> Result<Value> {
    let index = column.ordinal();
    let unsupported = || -> Result<Value> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }
        Err(AccessorError::unsupported_type(
            format!("column '{}'", column.name()),
            column.type_info().name(),
        ))
    };

    match Wire::resolve(column.type_info()) {
        Wire::Bool => scalar(row, index, Value::Bool),
        Wire::Int2 => scalar::<i16>(row, index, Value::from),
        Wire::Int4 => scalar::<i32>(row, index, Value::from),
        Wire::Int8 => scalar::<i64>(row, index, Value::from),
        Wire::Float4 => scalar(row, index, render_f32),
        Wire::Float8 => scalar(row, index, render_f64),
        Wire::Numeric => scalar(row, index, render_decimal),
        Wire::Money => scalar(row, index, |m: PgMoney| {
            render_decimal(m.to_decimal(MONEY_SCALE))
        }),
        Wire::Text => scalar(row, index, Value::String),
        Wire::Json | Wire::Jsonb => scalar(row, index, |v: Value| v),
        Wire::Timestamptz => scalar(row, index, render_timestamptz),
        Wire::Timestamp => scalar(row, index, render_timestamp),
        Wire::Date => scalar(row, index, render_date),
        Wire::Time => scalar(row, index, render_time),
        Wire::Timetz => scalar(row, index, |t: PgTimeTz<NaiveTime, FixedOffset>| {
            Value::String(format!("{}{}", time_text(&t.time), t.offset))
        }),
        Wire::Interval => scalar(row, index, |i: PgInterval| {
            Value::String(format_interval(&i))
        }),
        Wire::Uuid => scalar(row, index, render_uuid),
        Wire::Bytea => scalar(row, index, |b: Vec<u8>| Value::String(format_bytea(&b))),
        Wire::Inet => scalar(row, index, render_inet),
        Wire::Cidr => scalar(row, index, render_cidr),
        Wire::Oid => scalar(row, index, |oid: Oid| Value::from(oid.0)),
        Wire::Void => Ok(Value::Null),
        Wire::Array(element, _) => match *element {
            Wire::Bool => array(row, index, Value::Bool),
            Wire::Int2 => array::<i16>(row, index, Value::from),
            Wire::Int4 => array::<i32>(row, index, Value::from),
            Wire::Int8 => array::<i64>(row, index, Value::from),
            Wire::Float4 => array(row, index, render_f32),
            Wire::Float8 => array(row, index, render_f64),
            Wire::Numeric => array(row, index, render_decimal),
            Wire::Text => array(row, index, Value::String),
            Wire::Json | Wire::Jsonb => array(row, index, |v: Value| v),
            Wire::Timestamptz => array(row, index, render_timestamptz),
            Wire::Timestamp => array(row, index, render_timestamp),
            Wire::Date => array(row, index, render_date),
            Wire::Time => array(row, index, render_time),
            Wire::Interval => array(row, index, |i: PgInterval| {
                Value::String(format_interval(&i))
            }),
            Wire::Uuid => array(row, index, render_uuid),
            Wire::Inet => array(row, index, render_inet),
            Wire::Cidr => array(row, index, render_cidr),
            _ => unsupported(),
        },
        Wire::Unsupported => unsupported(),
    }
}

/// Decode without sqlx's type check so domains decode as their base type
fn scalar<'r, T>(row: &'r PgRow, index: usize, render: impl FnOnce(T) -> Value) -> Result<Value>
where
    T: Decode<'r, Postgres>,
{
    Ok(row
        .try_get_unchecked::<Option<T>, _>(index)?
        .map_or(Value::Null, render))
}

fn array<'r, T>(row: &'r PgRow, index: usize, render: impl Fn(T) -> Value) -> Result<Value>
where
    Vec<Option<T>>: Decode<'r, Postgres>,
{
    Ok(row
        .try_get_unchecked::<Option<Vec<Option<T>>>, _>(index)?
        .map_or(Value::Null, |items| {
            Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map_or(Value::Null, &render))
                    .collect(),
            )
        }))
}

/// Shortest decimal text of the `real`, so `0.1` reads back as `0.1`
fn render_f32(value: f32) -> Value {
    match value.to_string().parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(value.to_string()),
    }
}

/// Non-finite values have no JSON number and are returned as text
fn render_f64(value: f64) -> Value {
    Number::from_f64(value).map_or_else(|| Value::String(value.to_string()), Value::Number)
}

fn render_decimal(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(value.to_string()), Value::Number)
}

fn render_timestamptz(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339())
}

fn render_timestamp(value: NaiveDateTime) -> Value {
    Value::String(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn render_date(value: NaiveDate) -> Value {
    Value::String(value.to_string())
}

fn time_text(value: &NaiveTime) -> String {
    value.format("%H:%M:%S%.f").to_string()
}

fn render_time(value: NaiveTime) -> Value {
    Value::String(time_text(&value))
}

fn render_uuid(value: uuid::Uuid) -> Value {
    Value::String(value.to_string())
}

fn render_inet(value: IpNetwork) -> Value {
    Value::String(format_network(&value, false))
}

fn render_cidr(value: IpNetwork) -> Value {
    Value::String(format_network(&value, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_f32_uses_shortest_text() {
        assert_eq!(render_f32(0.1), Value::from(0.1));
        assert_eq!(render_f32(-2.25), Value::from(-2.25));
        assert_eq!(render_f32(f32::NAN), Value::String("NaN".to_string()));
    }

    #[test]
    fn test_render_non_finite_f64() {
        assert_eq!(render_f64(1.5), Value::from(1.5));
        assert_eq!(render_f64(f64::INFINITY), Value::String("inf".to_string()));
    }

    #[test]
    fn test_render_time() {
        let time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert_eq!(render_time(time), Value::String("10:30:00".to_string()));

        let precise = NaiveTime::from_hms_micro_opt(7, 5, 3, 250_000).unwrap();
        assert_eq!(render_time(precise), Value::String("07:05:03.250".to_string()));
    }

    #[test]
    fn test_render_timestamps() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let ts = date.and_hms_opt(10, 30, 0).unwrap();

        assert_eq!(render_date(date), Value::String("2024-01-15".to_string()));
        assert_eq!(
            render_timestamp(ts),
            Value::String("2024-01-15T10:30:00".to_string())
        );
        assert_eq!(
            render_timestamptz(ts.and_utc()),
            Value::String("2024-01-15T10:30:00+00:00".to_string())
        );
    }
}
