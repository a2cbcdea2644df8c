//! Core type definitions for the table accessor
//!
//! Includes rows, comparison operators, and ordered condition sets.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::AccessorError;

/// A result row: column name to value, in result column order
pub type Row = serde_json::Map<String, Value>;

// ============================================================================
// Operators
// ============================================================================

/// Comparison operator allowed in a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    /// `<>`, kept distinct from `!=` so the emitted token matches the input
    #[serde(rename = "<>")]
    NotEqual,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT LIKE")]
    NotLike,
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "NOT ILIKE")]
    NotILike,
}

impl Operator {
    /// SQL token written between the column and the placeholder
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::NotEqual => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::ILike => "ILIKE",
            Operator::NotILike => "NOT ILIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = AccessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<>" => Ok(Operator::NotEqual),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Gte),
            "<=" => Ok(Operator::Lte),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            "ILIKE" => Ok(Operator::ILike),
            "NOT ILIKE" => Ok(Operator::NotILike),
            _ => Err(AccessorError::invalid_argument(format!(
                "Unsupported comparison operator '{}'",
                s
            ))),
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// A single field condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field = value`
    Equals(Value),
    /// `field <operator> value`
    Compare { operator: Operator, value: Value },
}

impl Condition {
    pub fn operator(&self) -> Operator {
        match self {
            Condition::Equals(_) => Operator::Eq,
            Condition::Compare { operator, .. } => *operator,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Condition::Equals(value) | Condition::Compare { value, .. } => value,
        }
    }

    /// Null conditions emit no clause and bind no parameter
    pub fn is_null(&self) -> bool {
        self.value().is_null()
    }
}

/// Insertion-ordered set of field conditions, combined with AND
///
/// Inserting a field that is already present replaces its condition and keeps
/// its original position.
///
/// In JSON a condition set is an object keyed by field. A value that is an
/// object with an `operator` key is a comparison (`{"operator": ">",
/// "value": 18}`); any other value is an equality. Build a
/// [`Condition::Equals`] directly to compare against such an object.
///
/// # Example
/// ```
/// use runtara_table_accessor::{Conditions, Operator};
///
/// let conditions: Conditions =
///     serde_json::from_str(r#"{"age": {"operator": ">=", "value": 18}, "name": "J"}"#).unwrap();
///
/// assert_eq!(conditions, Conditions::new().compare("age", Operator::Gte, 18).eq("name", "J"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Condition)>,
}

impl Conditions {
    /// Create an empty condition set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the condition for `field`
    pub fn insert(&mut self, field: impl Into<String>, condition: Condition) {
        let field = field.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = condition,
            None => self.entries.push((field, condition)),
        }
    }

    /// Add an equality condition: field = value
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, Condition::Equals(value.into()));
        self
    }

    /// Add a comparison condition: field <operator> value
    pub fn compare(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.insert(
            field,
            Condition::Compare {
                operator,
                value: value.into(),
            },
        );
        self
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries.iter().map(|(f, c)| (f.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Condition)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, Condition)>>(iter: I) -> Self {
        let mut conditions = Conditions::new();
        for (field, condition) in iter {
            conditions.insert(field, condition);
        }
        conditions
    }
}

#[derive(Serialize)]
struct ComparisonRef<'a> {
    operator: Operator,
    value: &'a Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Comparison {
    operator: Operator,
    value: Value,
}

impl Serialize for Conditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, condition) in &self.entries {
            match condition {
                Condition::Equals(value) => map.serialize_entry(field, value)?,
                Condition::Compare { operator, value } => map.serialize_entry(
                    field,
                    &ComparisonRef {
                        operator: *operator,
                        value,
                    },
                )?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Map::<String, Value>::deserialize(deserializer)?;

        raw.into_iter()
            .map(|(field, value)| {
                let is_comparison = value
                    .as_object()
                    .is_some_and(|object| object.contains_key("operator"));

                let condition = if is_comparison {
                    let comparison: Comparison = serde_json::from_value(value).map_err(|e| {
                        D::Error::custom(format!("Invalid condition for '{}': {}", field, e))
                    })?;
                    Condition::Compare {
                        operator: comparison.operator,
                        value: comparison.value,
                    }
                } else {
                    Condition::Equals(value)
                };
                Ok((field, condition))
            })
            .collect()
    }
}

impl IntoIterator for Conditions {
    type Item = (String, Condition);
    type IntoIter = std::vec::IntoIter<(String, Condition)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
