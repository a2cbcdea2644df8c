//! JSON parameter binding by inferred placeholder type

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::TypeInfo;
use sqlx::postgres::types::{Oid, PgMoney, PgTimeTz};
use sqlx::postgres::{PgArguments, PgTypeInfo, Postgres};
use sqlx::types::ipnetwork::IpNetwork;

use super::wire::{ArrayParam, Wire, parse_bytea, parse_interval};
use crate::error::{AccessorError, Result};

pub(crate) type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Fractional digits of `money` under the default `lc_monetary`
pub(crate) const MONEY_SCALE: u32 = 2;

/// Bind a JSON value as the PostgreSQL type inferred for its placeholder
///
/// JSON null binds SQL NULL for every type. A non-null value for a type with
/// no binary representation fails with [`AccessorError::UnsupportedType`].
pub(crate) fn bind_json<'q>(
    query: PgQuery<'q>,
    index: usize,
    type_info: &PgTypeInfo,
    value: &Value,
) -> Result<PgQuery<'q>> {
    let type_name = type_info.name();

    Ok(match Wire::resolve(type_info) {
        Wire::Bool => query.bind(coerce(value, index, type_name, to_bool)?),
        Wire::Int2 => query.bind(coerce(value, index, type_name, to_i16)?),
        Wire::Int4 => query.bind(coerce(value, index, type_name, to_i32)?),
        Wire::Int8 => query.bind(coerce(value, index, type_name, to_i64)?),
        Wire::Float4 => query.bind(coerce(value, index, type_name, to_f32)?),
        Wire::Float8 => query.bind(coerce(value, index, type_name, to_f64)?),
        Wire::Numeric => query.bind(coerce(value, index, type_name, to_decimal)?),
        Wire::Money => query.bind(coerce(value, index, type_name, to_money)?),
        Wire::Text => query.bind(coerce(value, index, type_name, to_text)?),
        Wire::Json | Wire::Jsonb => query.bind(coerce(value, index, type_name, |v| Some(v.clone()))?),
        Wire::Timestamptz => query.bind(coerce(value, index, type_name, to_timestamptz)?),
        Wire::Timestamp => query.bind(coerce(value, index, type_name, to_timestamp)?),
        Wire::Date => query.bind(coerce(value, index, type_name, to_date)?),
        Wire::Time => query.bind(coerce(value, index, type_name, to_time)?),
        Wire::Timetz => query.bind(coerce(value, index, type_name, to_timetz)?),
        Wire::Interval => query.bind(coerce(value, index, type_name, |v| {
            v.as_str().and_then(parse_interval)
        })?),
        Wire::Uuid => query.bind(coerce(value, index, type_name, to_uuid)?),
        Wire::Bytea => query.bind(coerce(value, index, type_name, parse_bytea)?),
        Wire::Inet | Wire::Cidr => query.bind(coerce(value, index, type_name, to_network)?),
        Wire::Oid => query.bind(coerce(value, index, type_name, |v| {
            to_i64(v).and_then(|n| u32::try_from(n).ok()).map(Oid)
        })?),
        Wire::Array(element, element_info) => {
            bind_array(query, index, type_info, &element, &element_info, value)?
        }
        Wire::Void | Wire::Unsupported => {
            if !value.is_null() {
                return Err(AccessorError::unsupported_type(
                    format!("parameter ${}", index),
                    type_name,
                ));
            }
            query.bind(None::<String>)
        }
    })
}

fn bind_array<'q>(
    query: PgQuery<'q>,
    index: usize,
    type_info: &PgTypeInfo,
    element: &Wire,
    element_info: &PgTypeInfo,
    value: &Value,
) -> Result<PgQuery<'q>> {
    let type_name = type_info.name();

    Ok(match element {
        Wire::Bool => query.bind(coerce(value, index, type_name, |v| array_of(v, to_bool))?),
        Wire::Int2 => query.bind(coerce(value, index, type_name, |v| array_of(v, to_i16))?),
        Wire::Int4 => query.bind(coerce(value, index, type_name, |v| array_of(v, to_i32))?),
        Wire::Int8 => query.bind(coerce(value, index, type_name, |v| array_of(v, to_i64))?),
        Wire::Float4 => query.bind(coerce(value, index, type_name, |v| array_of(v, to_f32))?),
        Wire::Float8 => query.bind(coerce(value, index, type_name, |v| array_of(v, to_f64))?),
        Wire::Numeric => query.bind(coerce(value, index, type_name, |v| array_of(v, to_decimal))?),
        Wire::Timestamptz => query.bind(coerce(value, index, type_name, |v| {
            array_of(v, to_timestamptz)
        })?),
        Wire::Timestamp => query.bind(coerce(value, index, type_name, |v| {
            array_of(v, to_timestamp)
        })?),
        Wire::Date => query.bind(coerce(value, index, type_name, |v| array_of(v, to_date))?),
        Wire::Time => query.bind(coerce(value, index, type_name, |v| array_of(v, to_time))?),
        Wire::Interval => query.bind(coerce(value, index, type_name, |v| {
            array_of(v, |e| e.as_str().and_then(parse_interval))
        })?),
        Wire::Uuid => query.bind(coerce(value, index, type_name, |v| array_of(v, to_uuid))?),
        Wire::Inet | Wire::Cidr => {
            query.bind(coerce(value, index, type_name, |v| array_of(v, to_network))?)
        }
        Wire::Text | Wire::Json | Wire::Jsonb => {
            let element_oid = element_info.oid().map(|oid| oid.0).ok_or_else(|| {
                AccessorError::unsupported_type(format!("parameter ${}", index), type_name)
            })?;
            let items = coerce(value, index, type_name, |v| {
                array_of(v, |e| Some(textual_bytes(element, e)))
            })?;
            query.bind(items.map(|items| ArrayParam {
                type_info: type_info.clone(),
                element_oid,
                items,
            }))
        }
        _ if value.is_null() => query.bind(None::<String>),
        _ => {
            return Err(AccessorError::unsupported_type(
                format!("parameter ${}", index),
                type_name,
            ));
        }
    })
}

/// Binary form of a text-like array element
fn textual_bytes(element: &Wire, value: &Value) -> Vec<u8> {
    match element {
        Wire::Json => value.to_string().into_bytes(),
        Wire::Jsonb => {
            let mut bytes = vec![1];
            bytes.extend_from_slice(value.to_string().as_bytes());
            bytes
        }
        _ => match value {
            Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        },
    }
}

fn coerce<T>(
    value: &Value,
    index: usize,
    type_name: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    convert(value).map(Some).ok_or_else(|| {
        AccessorError::invalid_argument(format!(
            "Parameter ${} cannot be bound as {}: {}",
            index, type_name, value
        ))
    })
}

fn array_of<T>(
    value: &Value,
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<Vec<Option<T>>> {
    value
        .as_array()?
        .iter()
        .map(|element| {
            if element.is_null() {
                Some(None)
            } else {
                convert(element).map(Some)
            }
        })
        .collect()
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
}

fn to_i16(value: &Value) -> Option<i16> {
    to_i64(value).and_then(|n| i16::try_from(n).ok())
}

fn to_i32(value: &Value) -> Option<i32> {
    to_i64(value).and_then(|n| i32::try_from(n).ok())
}

fn to_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
}

/// Parsed from the decimal text so `0.1` stays the nearest `real`
fn to_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.to_string().parse::<f32>().ok(),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
}

fn to_money(value: &Value) -> Option<PgMoney> {
    let amount = match value {
        Value::String(s) => to_decimal(&Value::String(s.trim().trim_start_matches('$').replace(',', ""))),
        other => to_decimal(other),
    }?;
    Some(PgMoney::from_decimal(amount, MONEY_SCALE))
}

fn to_text(value: &Value) -> Option<String> {
    Some(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn to_timestamptz(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?;
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| to_timestamptz(value).map(|dt| dt.naive_utc()))
}

fn to_date(value: &Value) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.as_str()?, "%Y-%m-%d").ok()
}

fn to_time(value: &Value) -> Option<NaiveTime> {
    let s = value.as_str()?.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// `HH:MM[:SS[.f]]` followed by `Z` or a `+HH:MM` / `-HH:MM` offset
fn to_timetz(value: &Value) -> Option<PgTimeTz<NaiveTime, FixedOffset>> {
    let s = value.as_str()?.trim();
    let (time, offset) = match s.strip_suffix('Z') {
        Some(time) => (time, FixedOffset::east_opt(0)?),
        None => {
            let split = s.rfind(['+', '-'])?;
            (&s[..split], FixedOffset::from_str(&s[split..]).ok()?)
        }
    };
    let time = to_time(&Value::String(time.to_string()))?;
    Some(PgTimeTz { time, offset })
}

fn to_uuid(value: &Value) -> Option<uuid::Uuid> {
    uuid::Uuid::parse_str(value.as_str()?).ok()
}

fn to_network(value: &Value) -> Option<IpNetwork> {
    IpNetwork::from_str(value.as_str()?.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========================================================================
    // Scalar Coercion Tests
    // =========================================================================

    #[test]
    fn test_to_bool() {
        assert_eq!(to_bool(&json!(true)), Some(true));
        assert_eq!(to_bool(&json!("YES")), Some(true));
        assert_eq!(to_bool(&json!("0")), Some(false));
        assert_eq!(to_bool(&json!(1)), Some(true));
        assert_eq!(to_bool(&json!("maybe")), None);
        assert_eq!(to_bool(&json!(2)), None);
    }

    #[test]
    fn test_to_integers() {
        assert_eq!(to_i64(&json!(42)), Some(42));
        assert_eq!(to_i64(&json!(" -7 ")), Some(-7));
        assert_eq!(to_i64(&json!(1.5)), None);
        assert_eq!(to_i64(&json!("abc")), None);
        assert_eq!(to_i16(&json!(40_000)), None);
        assert_eq!(to_i32(&json!("12")), Some(12));
    }

    #[test]
    fn test_to_f32_keeps_decimal_text() {
        assert_eq!(to_f32(&json!(0.1)), Some(0.1_f32));
        assert_eq!(to_f32(&json!("-2.25")), Some(-2.25_f32));
        assert_eq!(to_f32(&json!(true)), None);
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(to_decimal(&json!(19.99)), Decimal::from_str("19.99").ok());
        assert_eq!(to_decimal(&json!("100.50")), Decimal::from_str("100.50").ok());
        assert_eq!(to_decimal(&json!("1e3")), Decimal::from_str("1000").ok());
        assert_eq!(to_decimal(&json!(true)), None);
    }

    #[test]
    fn test_to_money() {
        assert_eq!(to_money(&json!(12.34)), Some(PgMoney(1234)));
        assert_eq!(to_money(&json!("$1,000.50")), Some(PgMoney(100_050)));
        assert_eq!(to_money(&json!("lots")), None);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&json!("plain")), Some("plain".to_string()));
        assert_eq!(to_text(&json!(12)), Some("12".to_string()));
        assert_eq!(to_text(&json!(false)), Some("false".to_string()));
    }

    #[test]
    fn test_timestamps() {
        let tz = to_timestamptz(&json!("2024-01-15T10:30:00+02:00")).unwrap();
        assert_eq!(tz.to_rfc3339(), "2024-01-15T08:30:00+00:00");

        assert!(to_timestamp(&json!("2024-01-15T10:30:00")).is_some());
        assert!(to_timestamp(&json!("2024-01-15 10:30:00.250")).is_some());
        assert!(to_timestamp(&json!("2024-01-15T10:30:00Z")).is_some());
        assert!(to_timestamp(&json!("yesterday")).is_none());

        assert_eq!(
            to_date(&json!("2024-02-29")),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_to_time() {
        assert_eq!(to_time(&json!("10:30:00")), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(to_time(&json!("10:30")), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(
            to_time(&json!("23:59:59.125")),
            NaiveTime::from_hms_milli_opt(23, 59, 59, 125)
        );
        assert_eq!(to_time(&json!("25:00:00")), None);
    }

    #[test]
    fn test_to_timetz() {
        let plus = to_timetz(&json!("10:30:00+02:00")).unwrap();
        assert_eq!(plus.time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(plus.offset.local_minus_utc(), 7200);

        let minus = to_timetz(&json!("08:15-05:30")).unwrap();
        assert_eq!(minus.offset.local_minus_utc(), -(5 * 3600 + 30 * 60));

        let utc = to_timetz(&json!("23:00:00Z")).unwrap();
        assert_eq!(utc.offset.local_minus_utc(), 0);

        assert!(to_timetz(&json!("10:30:00")).is_none());
    }

    #[test]
    fn test_to_uuid() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(to_uuid(&json!(id.to_string())), Some(id));
        assert_eq!(to_uuid(&json!("not-a-uuid")), None);
    }

    #[test]
    fn test_to_network() {
        let host = to_network(&json!("10.0.0.1")).unwrap();
        assert_eq!(host.prefix(), 32);
        assert_eq!(to_network(&json!("10.0.0.0/8")).unwrap().prefix(), 8);
        assert!(to_network(&json!("10.0.0.256")).is_none());
    }

    #[test]
    fn test_textual_bytes() {
        assert_eq!(textual_bytes(&Wire::Text, &json!("abc")), b"abc".to_vec());
        assert_eq!(textual_bytes(&Wire::Text, &json!(5)), b"5".to_vec());
        assert_eq!(textual_bytes(&Wire::Json, &json!({"a": 1})), br#"{"a":1}"#.to_vec());
        assert_eq!(textual_bytes(&Wire::Jsonb, &json!(true)), b"\x01true".to_vec());
    }

    // =========================================================================
    // Coerce / Array Tests
    // =========================================================================

    #[test]
    fn test_coerce_null_binds_none() {
        let bound = coerce(&Value::Null, 1, "INT4", to_i64).unwrap();
        assert!(bound.is_none());
    }

    #[test]
    fn test_coerce_reports_placeholder() {
        let err = coerce(&json!("abc"), 3, "INT8", to_i64).unwrap_err();
        match err {
            AccessorError::InvalidArgument(msg) => {
                assert!(msg.contains("$3"));
                assert!(msg.contains("INT8"));
            }
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_array_of() {
        assert_eq!(
            array_of(&json!([1, null, "3"]), to_i64),
            Some(vec![Some(1), None, Some(3)])
        );
        assert_eq!(array_of(&json!([1, "x"]), to_i64), None);
        assert_eq!(array_of(&json!("not an array"), to_i64), None);
        assert_eq!(
            array_of(&json!(["a", "b"]), to_text),
            Some(vec![Some("a".to_string()), Some("b".to_string())])
        );
    }

    #[test]
    fn test_unsupported_parameter_names_placeholder() {
        let range = <sqlx::postgres::types::PgRange<i32> as sqlx::Type<Postgres>>::type_info();

        let query = sqlx::query::<Postgres>("SELECT $1");
        let err = bind_json(query, 2, &range, &json!("[1,5)")).err().expect("expected bind_json to fail");
        match err {
            AccessorError::UnsupportedType { target, type_name } => {
                assert_eq!(target, "parameter $2");
                assert_eq!(type_name, "INT4RANGE");
            }
            other => panic!("Expected UnsupportedType, got {:?}", other),
        }

        let query = sqlx::query::<Postgres>("SELECT $1");
        assert!(bind_json(query, 1, &range, &Value::Null).is_ok());
    }
}
