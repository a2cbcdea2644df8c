//! Per-table catalog metadata
//!
//! Column, unique-constraint and primary-key lists discovered from
//! `information_schema`, cached by table name.

use std::collections::HashMap;

/// Column names of the table, in `ordinal_position` order
pub const COLUMNS_QUERY: &str = r#"
SELECT column_name
FROM information_schema.columns
WHERE table_schema = current_schema()
  AND table_name = $1
ORDER BY ordinal_position
"#;

/// Columns taking part in any UNIQUE constraint of the table
pub const UNIQUE_COLUMNS_QUERY: &str = r#"
SELECT c.column_name
FROM information_schema.columns c
JOIN information_schema.key_column_usage kcu
  ON kcu.table_schema = c.table_schema
 AND kcu.table_name = c.table_name
 AND kcu.column_name = c.column_name
JOIN information_schema.table_constraints tc
  ON tc.constraint_schema = kcu.constraint_schema
 AND tc.constraint_name = kcu.constraint_name
WHERE c.table_schema = current_schema()
  AND c.table_name = $1
  AND tc.constraint_type = 'UNIQUE'
ORDER BY kcu.constraint_name, kcu.ordinal_position
"#;

/// Columns forming the PRIMARY KEY of the table
pub const PRIMARY_KEY_QUERY: &str = r#"
SELECT c.column_name
FROM information_schema.columns c
JOIN information_schema.key_column_usage kcu
  ON kcu.table_schema = c.table_schema
 AND kcu.table_name = c.table_name
 AND kcu.column_name = c.column_name
JOIN information_schema.table_constraints tc
  ON tc.constraint_schema = kcu.constraint_schema
 AND tc.constraint_name = kcu.constraint_name
WHERE c.table_schema = current_schema()
  AND c.table_name = $1
  AND tc.constraint_type = 'PRIMARY KEY'
ORDER BY kcu.ordinal_position
"#;

/// Snapshot of the cached metadata for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    /// Table name as passed to discovery
    pub table_name: String,
    /// Column names in catalog order
    pub columns: Vec<String>,
    /// Columns taking part in UNIQUE constraints
    pub unique_columns: Vec<String>,
    /// Primary key columns
    pub primary_key_columns: Vec<String>,
}

impl TableMetadata {
    /// Whether `column` is one of the table's columns
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Columns an upsert resolves conflicts on: the primary key when present,
    /// the unique columns otherwise
    pub fn conflict_target(&self) -> Option<&[String]> {
        if !self.primary_key_columns.is_empty() {
            Some(&self.primary_key_columns)
        } else if !self.unique_columns.is_empty() {
            Some(&self.unique_columns)
        } else {
            None
        }
    }
}

/// Metadata cache: three independent maps keyed by table name
///
/// Each discovery query overwrites only its own map, so a failure part-way
/// through discovery leaves the earlier maps updated.
#[derive(Debug, Default)]
pub struct MetadataCache {
    columns: HashMap<String, Vec<String>>,
    unique_columns: HashMap<String, Vec<String>>,
    primary_key_columns: HashMap<String, Vec<String>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_columns(&mut self, table: &str, columns: Vec<String>) {
        self.columns.insert(table.to_string(), columns);
    }

    pub fn set_unique_columns(&mut self, table: &str, columns: Vec<String>) {
        self.unique_columns.insert(table.to_string(), dedup(columns));
    }

    pub fn set_primary_key_columns(&mut self, table: &str, columns: Vec<String>) {
        self.primary_key_columns.insert(table.to_string(), columns);
    }

    /// Cached column list; `None` means the table was never discovered
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.columns.get(table).map(Vec::as_slice)
    }

    pub fn unique_columns(&self, table: &str) -> &[String] {
        self.unique_columns
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn primary_key_columns(&self, table: &str) -> &[String] {
        self.primary_key_columns
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Owned snapshot of a discovered table
    pub fn table(&self, table: &str) -> Option<TableMetadata> {
        let columns = self.columns(table)?;
        Some(TableMetadata {
            table_name: table.to_string(),
            columns: columns.to_vec(),
            unique_columns: self.unique_columns(table).to_vec(),
            primary_key_columns: self.primary_key_columns(table).to_vec(),
        })
    }

    /// Names of every table with cached columns, sorted
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.columns.keys().cloned().collect();
        names.sort();
        names
    }
}

fn dedup(columns: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(columns.len());
    for column in columns {
        if !seen.contains(&column) {
            seen.push(column);
        }
    }
    seen
}
