//! Condition building for SQL WHERE clauses
//!
//! Turns an ordered [`Conditions`] set into a fragment meant to follow a
//! `WHERE 1=1` base clause, plus the values to bind.

use serde_json::Value;

use crate::error::{AccessorError, Result};
use crate::sql::sanitize::render_identifier;
use crate::types::Conditions;

/// Build a WHERE fragment from a condition set
///
/// Returns (fragment, params) tuple where:
/// - `fragment` holds one `" AND <field> <operator> $<n>"` per non-null condition
/// - `params` holds the matching values in placeholder order
///
/// Null conditions are skipped. An empty or all-null set yields `("", [])`.
///
/// # Arguments
/// * `conditions` - The condition set, iterated in insertion order
/// * `param_offset` - Starting parameter number (mutated to track next available)
///
/// # Example
/// ```
/// use runtara_table_accessor::{Conditions, Operator};
/// use runtara_table_accessor::sql::build_condition_clause;
///
/// let conditions = Conditions::new().compare("age", Operator::Gt, 18).eq("name", "J");
/// let mut offset = 1;
/// let (fragment, params) = build_condition_clause(&conditions, &mut offset);
///
/// assert_eq!(fragment, " AND age > $1 AND name = $2");
/// assert_eq!(params, vec![serde_json::json!(18), serde_json::json!("J")]);
/// assert_eq!(offset, 3);
/// ```
pub fn build_condition_clause(
    conditions: &Conditions,
    param_offset: &mut usize,
) -> (String, Vec<Value>) {
    let mut fragment = String::new();
    let mut params = Vec::new();

    for (field, condition) in conditions.iter() {
        if condition.is_null() {
            continue;
        }

        fragment.push_str(&format!(
            " AND {} {} ${}",
            render_identifier(field),
            condition.operator().as_sql(),
            param_offset
        ));
        params.push(condition.value().clone());
        *param_offset += 1;
    }

    (fragment, params)
}

/// Rebuild a condition set with every field replaced by the matching catalog
/// column name
///
/// # Arguments
/// * `table` - Table name, used in the error
/// * `conditions` - Caller supplied conditions
/// * `columns` - Cached catalog columns of `table`
///
/// # Returns
/// The same conditions in the same order, keyed by catalog column names.
/// Fails with [`AccessorError::UnknownColumn`] on the first field that is not
/// a column of `table`.
pub fn resolve_condition_fields(
    table: &str,
    conditions: &Conditions,
    columns: &[String],
) -> Result<Conditions> {
    conditions
        .iter()
        .map(|(field, condition)| {
            columns
                .iter()
                .find(|column| column.as_str() == field)
                .map(|column| (column.clone(), condition.clone()))
                .ok_or_else(|| AccessorError::unknown_column(table, field))
        })
        .collect::<Result<Vec<_>>>()
        .map(|resolved| resolved.into_iter().collect())
}
