//! PostgreSQL wire types and their JSON text forms
//!
//! sqlx talks to PostgreSQL in the binary format, so a value can only be
//! exchanged when its Rust representation matches the column or parameter
//! type. [`Wire`] names the representation chosen for a type; anything
//! without one is [`Wire::Unsupported`] and is reported instead of guessed.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgTypeKind};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Postgres, Type, TypeInfo};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

static ISO_INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-)?P(?:(-?\d+)Y)?(?:(-?\d+)M)?(?:(-?\d+)W)?(?:(-?\d+)D)?(?:T(?:(-?\d+)H)?(?:(-?\d+)M)?(?:(-?)(\d+)(?:\.(\d{1,6}))?S)?)?$",
    )
    .expect("static interval pattern")
});

/// Binary representation used for a PostgreSQL type
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Wire {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Money,
    /// Types whose binary form is their text: the text family, enums,
    /// citext, xml and domains over them
    Text,
    Json,
    Jsonb,
    Timestamptz,
    Timestamp,
    Date,
    Time,
    Timetz,
    Interval,
    Uuid,
    Bytea,
    Inet,
    Cidr,
    Oid,
    Void,
    /// One-dimensional array; keeps the element type for its OID
    Array(Box<Wire>, PgTypeInfo),
    Unsupported,
}

impl Wire {
    /// Resolve the representation for a type reported by the server
    ///
    /// Domains resolve to their base type and enums to [`Wire::Text`].
    pub(crate) fn resolve(type_info: &PgTypeInfo) -> Wire {
        match type_info.kind() {
            PgTypeKind::Domain(base) => Wire::resolve(base),
            PgTypeKind::Enum(_) => Wire::Text,
            PgTypeKind::Array(element) => {
                let inner = Wire::resolve(element);
                // Array headers carry the element OID; only text-like
                // elements are written with the domain's own OID
                let is_domain = matches!(element.kind(), PgTypeKind::Domain(_));
                if inner == Wire::Unsupported || (is_domain && !inner.is_textual()) {
                    Wire::Unsupported
                } else {
                    Wire::Array(Box::new(inner), element.clone())
                }
            }
            _ => Wire::from_name(type_info.name()),
        }
    }

    /// Map a type name as sqlx reports it
    ///
    /// sqlx names `bpchar` as `CHAR` and the single-byte `"char"` as
    /// `"CHAR"`; extension types keep their lowercase catalog name.
    pub(crate) fn from_name(name: &str) -> Wire {
        match name {
            "BOOL" => Wire::Bool,
            "INT2" => Wire::Int2,
            "INT4" => Wire::Int4,
            "INT8" => Wire::Int8,
            "FLOAT4" => Wire::Float4,
            "FLOAT8" => Wire::Float8,
            "NUMERIC" => Wire::Numeric,
            "MONEY" => Wire::Money,
            "TEXT" | "VARCHAR" | "CHAR" | "\"CHAR\"" | "NAME" | "UNKNOWN" | "XML" | "citext" => {
                Wire::Text
            }
            "JSON" => Wire::Json,
            "JSONB" => Wire::Jsonb,
            "TIMESTAMPTZ" => Wire::Timestamptz,
            "TIMESTAMP" => Wire::Timestamp,
            "DATE" => Wire::Date,
            "TIME" => Wire::Time,
            "TIMETZ" => Wire::Timetz,
            "INTERVAL" => Wire::Interval,
            "UUID" => Wire::Uuid,
            "BYTEA" => Wire::Bytea,
            "INET" => Wire::Inet,
            "CIDR" => Wire::Cidr,
            "OID" => Wire::Oid,
            "VOID" => Wire::Void,
            _ => Wire::Unsupported,
        }
    }

    /// Whether values travel as raw text bytes (JSON included)
    pub(crate) fn is_textual(&self) -> bool {
        matches!(self, Wire::Text | Wire::Json | Wire::Jsonb)
    }
}

// =========================================================================
// Text-Like Arrays
// =========================================================================

/// Array parameter whose elements are already in binary form
///
/// `Vec<String>` always declares `text` as its element type, which
/// PostgreSQL rejects for `varchar[]`, enum arrays or `json[]`. This writes
/// the element OID of the actual parameter type instead.
#[derive(Debug, Clone)]
pub(crate) struct ArrayParam {
    pub(crate) type_info: PgTypeInfo,
    pub(crate) element_oid: u32,
    pub(crate) items: Vec<Option<Vec<u8>>>,
}

impl Type<Postgres> for ArrayParam {
    fn type_info() -> PgTypeInfo {
        <Vec<String> as Type<Postgres>>::type_info()
    }
}

impl Encode<'_, Postgres> for ArrayParam {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        write_array(buf, self.element_oid, &self.items)?;
        Ok(IsNull::No)
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.type_info.clone())
    }
}

/// Write a one-dimensional array in PostgreSQL's binary array format
///
/// An empty array is written with zero dimensions.
pub(crate) fn write_array(
    out: &mut Vec<u8>,
    element_oid: u32,
    items: &[Option<Vec<u8>>],
) -> Result<(), BoxDynError> {
    let dimensions: i32 = if items.is_empty() { 0 } else { 1 };
    let has_nulls = i32::from(items.iter().any(Option::is_none));

    out.extend_from_slice(&dimensions.to_be_bytes());
    out.extend_from_slice(&has_nulls.to_be_bytes());
    out.extend_from_slice(&element_oid.to_be_bytes());

    if items.is_empty() {
        return Ok(());
    }

    out.extend_from_slice(&i32::try_from(items.len())?.to_be_bytes());
    out.extend_from_slice(&1_i32.to_be_bytes());

    for item in items {
        match item {
            Some(bytes) => {
                out.extend_from_slice(&i32::try_from(bytes.len())?.to_be_bytes());
                out.extend_from_slice(bytes);
            }
            None => out.extend_from_slice(&(-1_i32).to_be_bytes()),
        }
    }
    Ok(())
}

// =========================================================================
// Interval
// =========================================================================

/// Render an interval as ISO 8601, e.g. `P1Y2M3DT4H5M6.5S`
///
/// Each field keeps its own sign, as PostgreSQL's `iso_8601` style does.
pub(crate) fn format_interval(interval: &PgInterval) -> String {
    let mut out = String::from("P");

    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        out.push_str(&format!("{}Y", years));
    }
    if months != 0 {
        out.push_str(&format!("{}M", months));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    let micros = interval.microseconds;
    let hours = micros / MICROS_PER_HOUR;
    let minutes = (micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
    let seconds = micros % MICROS_PER_MINUTE;

    if micros != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes != 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds != 0 {
            out.push_str(&format!("{}S", format_seconds(seconds)));
        }
    }

    if out == "P" { "PT0S".to_string() } else { out }
}

fn format_seconds(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let micros = micros.unsigned_abs();
    let (whole, fraction) = (micros / 1_000_000, micros % 1_000_000);

    if fraction == 0 {
        format!("{}{}", sign, whole)
    } else {
        let fraction = format!("{:06}", fraction);
        format!("{}{}.{}", sign, whole, fraction.trim_end_matches('0'))
    }
}

/// Parse an ISO 8601 duration such as `P1DT2H` or `PT0.25S`
///
/// Weeks count as seven days. Returns `None` for other notations or when a
/// field overflows.
pub(crate) fn parse_interval(text: &str) -> Option<PgInterval> {
    let text = text.trim();
    if text.ends_with('P') || text.ends_with('T') {
        return None;
    }
    let caps = ISO_INTERVAL.captures(text)?;

    let field = |i: usize| -> Option<i64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse::<i64>().ok())
    };

    let months = field(2)?.checked_mul(12)?.checked_add(field(3)?)?;
    let days = field(4)?.checked_mul(7)?.checked_add(field(5)?)?;

    let mut seconds = field(9)?.checked_mul(MICROS_PER_SECOND)?;
    if let Some(fraction) = caps.get(10) {
        seconds += format!("{:0<6}", fraction.as_str()).parse::<i64>().ok()?;
    }
    if caps.get(8).is_some_and(|m| !m.as_str().is_empty()) {
        seconds = -seconds;
    }

    let micros = field(6)?
        .checked_mul(MICROS_PER_HOUR)?
        .checked_add(field(7)?.checked_mul(MICROS_PER_MINUTE)?)?
        .checked_add(seconds)?;

    let sign = if caps.get(1).is_some() { -1 } else { 1 };

    Some(PgInterval {
        months: i32::try_from(months * sign).ok()?,
        days: i32::try_from(days * sign).ok()?,
        microseconds: micros.checked_mul(sign)?,
    })
}

// =========================================================================
// Bytea / Network Addresses
// =========================================================================

/// Render bytes in PostgreSQL's hex format, `\x0a1b`
pub(crate) fn format_bytea(bytes: &[u8]) -> String {
    format!("\\x{}", hex::encode(bytes))
}

/// Parse `\x`-prefixed hex, or an array of byte values
pub(crate) fn parse_bytea(value: &serde_json::Value) -> Option<Vec<u8>> {
    match value {
        serde_json::Value::String(s) => hex::decode(s.strip_prefix("\\x")?).ok(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

/// Render an address the way PostgreSQL prints it
///
/// `inet` drops the prefix of a single host; `cidr` always shows it.
pub(crate) fn format_network(network: &IpNetwork, always_prefix: bool) -> String {
    let host_prefix = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };

    if !always_prefix && network.prefix() == host_prefix {
        network.ip().to_string()
    } else {
        format!("{}/{}", network.ip(), network.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_resolve_builtin_types() {
        assert_eq!(Wire::resolve(&<String as Type<Postgres>>::type_info()), Wire::Text);
        assert_eq!(
            Wire::resolve(&<PgInterval as Type<Postgres>>::type_info()),
            Wire::Interval
        );
        assert_eq!(Wire::resolve(&<IpNetwork as Type<Postgres>>::type_info()), Wire::Inet);
        assert_eq!(Wire::resolve(&<Vec<u8> as Type<Postgres>>::type_info()), Wire::Bytea);
    }

    #[test]
    fn test_resolve_arrays_keep_element() {
        let real_array = <Vec<f32> as Type<Postgres>>::type_info();
        match Wire::resolve(&real_array) {
            Wire::Array(element, info) => {
                assert_eq!(*element, Wire::Float4);
                assert_eq!(info.name(), "FLOAT4");
            }
            other => panic!("Expected array, got {:?}", other),
        }

        let tz_array = <Vec<DateTime<Utc>> as Type<Postgres>>::type_info();
        assert!(matches!(
            Wire::resolve(&tz_array),
            Wire::Array(element, _) if *element == Wire::Timestamptz
        ));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Wire::from_name("CHAR"), Wire::Text);
        assert_eq!(Wire::from_name("citext"), Wire::Text);
        assert_eq!(Wire::from_name("TIMETZ"), Wire::Timetz);
        assert_eq!(Wire::from_name("CIDR"), Wire::Cidr);
        assert_eq!(Wire::from_name("POINT"), Wire::Unsupported);
        assert_eq!(Wire::from_name("MACADDR"), Wire::Unsupported);
        assert_eq!(Wire::from_name("geometry"), Wire::Unsupported);
    }

    #[test]
    fn test_write_array() {
        let mut out = Vec::new();
        write_array(&mut out, 1043, &[Some(b"ab".to_vec()), None]).unwrap();

        let mut expected = Vec::new();
        for word in [1_i32, 1, 1043, 2, 1, 2] {
            expected.extend_from_slice(&word.to_be_bytes());
        }
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&(-1_i32).to_be_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_write_empty_array() {
        let mut out = Vec::new();
        write_array(&mut out, 25, &[]).unwrap();
        assert_eq!(out, [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 25]);
    }

    #[test]
    fn test_format_interval() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };

        assert_eq!(format_interval(&interval(0, 1, 0)), "P1D");
        assert_eq!(format_interval(&interval(14, 3, 0)), "P1Y2M3D");
        assert_eq!(
            format_interval(&interval(0, 0, 2 * MICROS_PER_HOUR + 30 * MICROS_PER_MINUTE)),
            "PT2H30M"
        );
        assert_eq!(format_interval(&interval(0, 0, 6_500_000)), "PT6.5S");
        assert_eq!(format_interval(&interval(0, -2, -1_250_000)), "P-2DT-1.25S");
        assert_eq!(format_interval(&interval(0, 0, 0)), "PT0S");
    }

    #[test]
    fn test_parse_interval() {
        let parsed = parse_interval("P1Y2M3DT4H5M6.5S").unwrap();
        assert_eq!(parsed.months, 14);
        assert_eq!(parsed.days, 3);
        assert_eq!(
            parsed.microseconds,
            4 * MICROS_PER_HOUR + 5 * MICROS_PER_MINUTE + 6_500_000
        );

        let weeks = parse_interval("P2W").unwrap();
        assert_eq!(weeks.days, 14);

        let negative = parse_interval("-P1DT1H").unwrap();
        assert_eq!(negative.days, -1);
        assert_eq!(negative.microseconds, -MICROS_PER_HOUR);

        assert_eq!(parse_interval("PT-0.5S").unwrap().microseconds, -500_000);

        for text in ["PT2H30M", "P1D", "P-2DT-1.25S", "PT0S"] {
            assert_eq!(format_interval(&parse_interval(text).unwrap()), text);
        }
    }

    #[test]
    fn test_parse_interval_rejects_other_notations() {
        assert!(parse_interval("1 day").is_none());
        assert!(parse_interval("02:00:00").is_none());
        assert!(parse_interval("P").is_none());
        assert!(parse_interval("P1DT").is_none());
        assert!(parse_interval("PT0.1234567S").is_none());
        assert!(parse_interval("P99999999999Y").is_none());
    }

    #[test]
    fn test_bytea() {
        assert_eq!(format_bytea(&[0xde, 0xad, 0x00]), "\\xdead00");
        assert_eq!(parse_bytea(&json!("\\xDEAD00")), Some(vec![0xde, 0xad, 0x00]));
        assert_eq!(parse_bytea(&json!([1, 255])), Some(vec![1, 255]));
        assert_eq!(parse_bytea(&json!("dead")), None);
        assert_eq!(parse_bytea(&json!([256])), None);
    }

    #[test]
    fn test_format_network() {
        let host = IpNetwork::from_str("10.0.0.1").unwrap();
        assert_eq!(format_network(&host, false), "10.0.0.1");
        assert_eq!(format_network(&host, true), "10.0.0.1/32");

        let net = IpNetwork::from_str("192.168.0.0/16").unwrap();
        assert_eq!(format_network(&net, false), "192.168.0.0/16");

        let v6 = IpNetwork::from_str("::1").unwrap();
        assert_eq!(format_network(&v6, false), "::1");
    }
}
