//! DML generation for catalog-described tables
//!
//! Every identifier passed in here must come from catalog discovery; values
//! are always referenced through `$n` placeholders.

use crate::sql::sanitize::{render_identifier, render_identifier_list};

/// Statement generator bound to one table
pub struct DmlGenerator<'a> {
    table: &'a str,
}

impl<'a> DmlGenerator<'a> {
    /// Create a generator for `table`
    pub fn new(table: &'a str) -> Self {
        Self { table }
    }

    /// `SELECT * FROM <table> WHERE 1=1<fragment>`
    pub fn generate_select(&self, condition_fragment: &str) -> String {
        format!(
            "SELECT * FROM {} WHERE 1=1{}",
            render_identifier(self.table),
            condition_fragment
        )
    }

    /// `DELETE FROM <table> WHERE 1=1<fragment> RETURNING *`
    pub fn generate_delete(&self, condition_fragment: &str) -> String {
        format!(
            "DELETE FROM {} WHERE 1=1{} RETURNING *",
            render_identifier(self.table),
            condition_fragment
        )
    }

    /// `UPDATE <table> SET k1 = $1, .. WHERE 1=1<fragment> RETURNING *`
    ///
    /// SET placeholders are numbered from 1, so the condition fragment must
    /// have been built with an offset of `columns.len() + 1`.
    ///
    /// # Arguments
    /// * `columns` - Catalog columns to assign, in parameter order
    /// * `condition_fragment` - Output of `build_condition_clause`
    pub fn generate_update(&self, columns: &[String], condition_fragment: &str) -> String {
        format!(
            "UPDATE {} SET {} WHERE 1=1{} RETURNING *",
            render_identifier(self.table),
            Self::assignments(columns),
            condition_fragment
        )
    }

    /// `INSERT .. ON CONFLICT (<target>) DO UPDATE SET .. RETURNING *`
    ///
    /// The SET list reuses the VALUES placeholders, so the statement binds
    /// exactly `columns.len()` parameters.
    ///
    /// # Arguments
    /// * `columns` - Catalog columns to insert, in parameter order
    /// * `conflict_target` - Primary key or unique columns for `ON CONFLICT`
    pub fn generate_upsert(&self, columns: &[String], conflict_target: &[String]) -> String {
        let placeholders = (1..=columns.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {} RETURNING *",
            render_identifier(self.table),
            render_identifier_list(columns),
            placeholders,
            render_identifier_list(conflict_target),
            Self::assignments(columns)
        )
    }

    fn assignments(columns: &[String]) -> String {
        columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ${}", render_identifier(col), i + 1))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
