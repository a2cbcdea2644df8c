//! Field name conversion and record flattening
//!
//! Maps application objects onto flat, snake_case keyed records that line up
//! with table column names.

use serde_json::{Map, Value};

use crate::error::{AccessorError, Result};

/// A single-level record keyed by snake_case column candidates
pub type FlatRecord = Map<String, Value>;

/// Convert a mixed-case field name to snake_case
///
/// An underscore is inserted before an uppercase letter that follows a
/// lowercase letter or digit, or that is followed by a lowercase letter.
/// A leading capital therefore yields a leading underscore (`"Name"` becomes
/// `"_name"`).
///
/// # Example
/// ```
/// use runtara_table_accessor::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("firstName"), "first_name");
/// assert_eq!(to_snake_case("HTTPServer"), "http_server");
/// assert_eq!(to_snake_case("already_snake"), "already_snake");
/// ```
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower_or_digit = i > 0 && {
                let prev = chars[i - 1];
                prev.is_lowercase() || prev.is_ascii_digit()
            };
            let before_lower = chars.get(i + 1).is_some_and(|next| next.is_lowercase());

            if after_lower_or_digit || before_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// Flatten a nested JSON object into a single-level record
///
/// Nested objects are merged with underscore-joined, snake_case keys. Arrays
/// and scalars (including `null`) are kept as leaf values. A `null` input
/// yields an empty record; any other non-object input is rejected.
///
/// # Example
/// ```
/// use runtara_table_accessor::naming::flatten;
/// use serde_json::json;
///
/// let flat = flatten(&json!({"profile": {"firstName": "Ada"}, "tags": ["a"]})).unwrap();
/// assert_eq!(flat["profile_first_name"], json!("Ada"));
/// assert_eq!(flat["tags"], json!(["a"]));
/// ```
pub fn flatten(value: &Value) -> Result<FlatRecord> {
    flatten_with_prefix(value, "")
}

/// Flatten an optional value; `None` yields an empty record
pub fn flatten_opt(value: Option<&Value>) -> Result<FlatRecord> {
    match value {
        Some(value) => flatten(value),
        None => Ok(FlatRecord::new()),
    }
}

/// Flatten `value`, prefixing every produced key with `prefix`
pub fn flatten_with_prefix(value: &Value, prefix: &str) -> Result<FlatRecord> {
    let object = match value {
        Value::Null => return Ok(FlatRecord::new()),
        Value::Object(object) => object,
        other => {
            return Err(AccessorError::invalid_argument(format!(
                "Expected an object to flatten, got {}",
                json_kind(other)
            )));
        }
    };

    let mut record = FlatRecord::new();
    flatten_into(&mut record, object, prefix);
    Ok(record)
}

fn flatten_into(record: &mut FlatRecord, object: &Map<String, Value>, prefix: &str) {
    for (key, value) in object {
        let new_key = if prefix.is_empty() {
            to_snake_case(key)
        } else {
            to_snake_case(&format!("{}_{}", prefix, key))
        };

        match value {
            Value::Object(nested) => flatten_into(record, nested, &new_key),
            leaf => {
                record.insert(new_key, leaf.clone());
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========================================================================
    // to_snake_case Tests
    // =========================================================================

    #[test]
    fn test_snake_case_idempotent() {
        for s in ["id", "first_name", "user_123_name", "a_b_c", "", "_x"] {
            assert_eq!(to_snake_case(s), s);
        }
    }

    #[test]
    fn test_snake_case_camel() {
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("createdAtUtc"), "created_at_utc");
    }

    #[test]
    fn test_snake_case_digits() {
        assert_eq!(to_snake_case("user123Name"), "user123_name");
        assert_eq!(to_snake_case("123UserName"), "123_user_name");
    }

    #[test]
    fn test_snake_case_leading_capital_quirk() {
        assert_eq!(to_snake_case("Name"), "_name");
    }

    #[test]
    fn test_snake_case_acronyms() {
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("ID"), "id");
    }

    // =========================================================================
    // flatten Tests
    // =========================================================================

    #[test]
    fn test_flatten_nested() {
        let flat = flatten(&json!({"profile": {"firstName": "A"}, "email": "e"})).unwrap();

        assert_eq!(flat.len(), 2);
        assert_eq!(flat["profile_first_name"], json!("A"));
        assert_eq!(flat["email"], json!("e"));
    }

    #[test]
    fn test_flatten_keeps_arrays() {
        let flat = flatten(&json!({"tags": ["a", "b"], "name": "x"})).unwrap();

        assert_eq!(flat["tags"], json!(["a", "b"]));
        assert_eq!(flat["name"], json!("x"));
    }

    #[test]
    fn test_flatten_keeps_null_leaves() {
        let flat = flatten(&json!({"middleName": null})).unwrap();
        assert_eq!(flat["middle_name"], Value::Null);
    }

    #[test]
    fn test_flatten_deeply_nested() {
        let flat = flatten(&json!({"a": {"b": {"cValue": 1}}})).unwrap();
        assert_eq!(flat["a_b_c_value"], json!(1));
    }

    #[test]
    fn test_flatten_preserves_key_order() {
        let flat = flatten(&json!({"zeta": 1, "alpha": {"x": 2}, "mid": 3})).unwrap();
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha_x", "mid"]);
    }

    #[test]
    fn test_flatten_collision_later_wins() {
        let flat = flatten(&json!({"profile_name": "first", "profile": {"name": "second"}})).unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["profile_name"], json!("second"));
    }

    #[test]
    fn test_flatten_null_and_none() {
        assert!(flatten(&Value::Null).unwrap().is_empty());
        assert!(flatten_opt(None).unwrap().is_empty());
    }

    #[test]
    fn test_flatten_rejects_non_objects() {
        for value in [json!("x"), json!(1), json!(true), json!([1, 2])] {
            let err = flatten(&value).unwrap_err();
            assert!(matches!(err, AccessorError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_flatten_with_prefix() {
        let flat = flatten_with_prefix(&json!({"city": "Oslo"}), "address").unwrap();
        assert_eq!(flat["address_city"], json!("Oslo"));
    }
}
