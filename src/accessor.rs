//! TableAccessor - catalog-driven CRUD and upsert over existing tables
//!
//! Tables are opted in with [`TableAccessor::add_table`], which caches their
//! columns and keys from `information_schema`. Data operations then build
//! parameterized statements from that cached metadata.

use std::sync::Arc;

use serde_json::Value;

use crate::connection::{Connection, ConnectionProvider};
use crate::error::{AccessorError, Result};
use crate::metadata::{
    COLUMNS_QUERY, MetadataCache, PRIMARY_KEY_QUERY, TableMetadata, UNIQUE_COLUMNS_QUERY,
};
use crate::naming::{FlatRecord, flatten};
use crate::postgres::PgConnectionProvider;
use crate::sql::{DmlGenerator, build_condition_clause, resolve_condition_fields};
use crate::types::{Conditions, Row};

/// Generic table accessor over one shared connection
///
/// Identifiers written into SQL text always come from the metadata cache;
/// caller-supplied values are always bound as parameters.
pub struct TableAccessor {
    /// Source of the connection handle
    provider: Arc<dyn ConnectionProvider>,
    /// Handle obtained on first use
    connection: Option<Arc<dyn Connection>>,
    /// Discovered table metadata
    metadata: MetadataCache,
}

impl TableAccessor {
    /// Create an accessor; no connection is made until first use
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            connection: None,
            metadata: MetadataCache::new(),
        }
    }

    /// Create an accessor over PostgreSQL configured from `DB_*` variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(PgConnectionProvider::from_env()?)))
    }

    /// Obtain the connection handle from the provider
    ///
    /// A no-op while a handle is already held.
    pub async fn initialize(&mut self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&mut self) -> Result<Arc<dyn Connection>> {
        if let Some(connection) = &self.connection {
            return Ok(Arc::clone(connection));
        }

        let connection = self.provider.get_connection().await?;
        self.connection = Some(Arc::clone(&connection));
        Ok(connection)
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let connection = self.connection().await?;
        connection.query(sql, params).await
    }

    // ==================== Discovery ====================

    /// Discover and cache the columns, unique columns and primary key of
    /// `table_name`
    ///
    /// Each lookup overwrites its own cache entry as soon as it succeeds, so a
    /// failing lookup leaves the earlier ones in place.
    pub async fn add_table(&mut self, table_name: &str) -> Result<()> {
        let table_param = [Value::String(table_name.to_string())];

        let columns = self
            .discover(table_name, COLUMNS_QUERY, &table_param)
            .await?;
        if columns.is_empty() {
            tracing::warn!(table = table_name, "No columns discovered for table");
        }
        self.metadata.set_columns(table_name, columns);

        let unique = self
            .discover(table_name, UNIQUE_COLUMNS_QUERY, &table_param)
            .await?;
        self.metadata.set_unique_columns(table_name, unique);

        let primary_key = self
            .discover(table_name, PRIMARY_KEY_QUERY, &table_param)
            .await?;
        self.metadata
            .set_primary_key_columns(table_name, primary_key);

        tracing::info!(
            table = table_name,
            columns = self.metadata.columns(table_name).map_or(0, <[String]>::len),
            unique_columns = self.metadata.unique_columns(table_name).len(),
            primary_key_columns = self.metadata.primary_key_columns(table_name).len(),
            "Discovered table"
        );

        Ok(())
    }

    async fn discover(&mut self, table_name: &str, sql: &str, params: &[Value]) -> Result<Vec<String>> {
        let rows = self
            .execute(sql, params)
            .await
            .map_err(|e| AccessorError::schema_discovery(table_name, e))?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("column_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Cached metadata for a discovered table
    pub fn table_metadata(&self, table_name: &str) -> Option<TableMetadata> {
        self.metadata.table(table_name)
    }

    /// Names of all discovered tables, sorted
    pub fn discovered_tables(&self) -> Vec<String> {
        self.metadata.tables()
    }

    fn known_columns(&self, table_name: &str) -> Result<&[String]> {
        self.metadata
            .columns(table_name)
            .ok_or_else(|| AccessorError::SchemaNotDiscovered(table_name.to_string()))
    }

    /// Flatten `data` and keep only the keys that are columns of `table_name`
    ///
    /// `null` data yields an empty record. Explicit `null` values are kept.
    pub fn filter_to_known_columns(&self, data: &Value, table_name: &str) -> Result<FlatRecord> {
        let columns = self.known_columns(table_name)?;

        Ok(flatten(data)?
            .into_iter()
            .filter(|(key, _)| columns.iter().any(|column| column == key))
            .collect())
    }

    fn filter_non_empty(&self, data: &Value, table_name: &str) -> Result<FlatRecord> {
        let record = self.filter_to_known_columns(data, table_name)?;
        if record.is_empty() {
            return Err(AccessorError::NoValidColumns(table_name.to_string()));
        }
        Ok(record)
    }

    fn resolve_conditions(&self, table_name: &str, conditions: &Conditions) -> Result<Conditions> {
        resolve_condition_fields(table_name, conditions, self.known_columns(table_name)?)
    }

    // ==================== Data Operations ====================

    /// Insert `data`, or update the existing row it conflicts with
    ///
    /// Conflicts are detected on the primary key, or on the unique columns
    /// when the table has no primary key. `conditions` does not affect the
    /// statement. Returns the inserted or updated row.
    pub async fn upsert(
        &mut self,
        table_name: &str,
        data: &Value,
        conditions: &Conditions,
    ) -> Result<Row> {
        let record = self.filter_non_empty(data, table_name)?;

        let conflict_target = self
            .metadata
            .table(table_name)
            .and_then(|meta| meta.conflict_target().map(<[String]>::to_vec))
            .ok_or_else(|| AccessorError::NoUniqueConstraint(table_name.to_string()))?;

        if !conditions.is_empty() {
            tracing::debug!(
                table = table_name,
                conditions = conditions.len(),
                "Upsert resolves on its conflict target; conditions not applied"
            );
        }

        let (columns, params): (Vec<String>, Vec<Value>) = record.into_iter().unzip();
        let sql = DmlGenerator::new(table_name).generate_upsert(&columns, &conflict_target);

        self.execute(&sql, &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AccessorError::EmptyResult(table_name.to_string()))
    }

    /// Update the rows matching `conditions` with `data`; returns the updated rows
    pub async fn update(
        &mut self,
        table_name: &str,
        data: &Value,
        conditions: &Conditions,
    ) -> Result<Vec<Row>> {
        let record = self.filter_non_empty(data, table_name)?;
        let conditions = self.resolve_conditions(table_name, conditions)?;

        let (columns, mut params): (Vec<String>, Vec<Value>) = record.into_iter().unzip();
        let mut param_offset = columns.len() + 1;
        let (fragment, condition_params) = build_condition_clause(&conditions, &mut param_offset);
        params.extend(condition_params);

        let sql = DmlGenerator::new(table_name).generate_update(&columns, &fragment);
        self.execute(&sql, &params).await
    }

    /// Rows matching `conditions`; an empty set reads the whole table
    pub async fn read(&mut self, table_name: &str, conditions: &Conditions) -> Result<Vec<Row>> {
        let conditions = self.resolve_conditions(table_name, conditions)?;

        let mut param_offset = 1;
        let (fragment, params) = build_condition_clause(&conditions, &mut param_offset);

        let sql = DmlGenerator::new(table_name).generate_select(&fragment);
        self.execute(&sql, &params).await
    }

    /// Delete the rows matching `conditions`; returns the deleted rows
    pub async fn delete(&mut self, table_name: &str, conditions: &Conditions) -> Result<Vec<Row>> {
        let conditions = self.resolve_conditions(table_name, conditions)?;

        let mut param_offset = 1;
        let (fragment, params) = build_condition_clause(&conditions, &mut param_offset);

        let sql = DmlGenerator::new(table_name).generate_delete(&fragment);
        self.execute(&sql, &params).await
    }

    /// Run caller-written SQL unchanged
    ///
    /// Nothing here protects against injection: dynamic values must be passed
    /// through `params`.
    pub async fn raw_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.execute(sql, params).await
    }

    /// Release the connection through the provider
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.connection.take().is_some() {
            self.provider.close_connection().await?;
            tracing::info!("Table accessor disconnected");
        }
        Ok(())
    }
}
