//! PostgreSQL connection provider backed by a single `sqlx` connection
//!
//! Statements are prepared before execution so that PostgreSQL infers the type
//! of every `$n` placeholder. JSON parameters are then converted to those
//! types, and result columns are decoded back to JSON by their column type.
//!
//! | PostgreSQL | JSON |
//! |------------|------|
//! | `bool` | boolean |
//! | `int2`, `int4`, `int8`, `oid` | number |
//! | `real`, `double precision`, `numeric`, `money` | number (non-finite as text) |
//! | text family, enums, `citext`, `xml` | string |
//! | `json`, `jsonb` | the JSON value |
//! | `timestamptz` | RFC 3339 string |
//! | `timestamp` | `YYYY-MM-DDTHH:MM:SS[.f]` |
//! | `date` | `YYYY-MM-DD` |
//! | `time`, `timetz` | `HH:MM:SS[.f]`, with `+HH:MM` offset for `timetz` |
//! | `interval` | ISO 8601 duration, e.g. `P1DT2H` |
//! | `uuid` | string |
//! | `bytea` | `\x` hex string |
//! | `inet`, `cidr` | address; `inet` omits the prefix of a single host |
//!
//! Domains use their base type. One-dimensional arrays are supported for the
//! scalar types above except `money`, `timetz`, `bytea` and `oid`. Any other
//! type fails with [`AccessorError::UnsupportedType`] naming the column or
//! placeholder; a JSON null still binds to it.

mod bind;
mod decode;
mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgTypeInfo};
use sqlx::{Connection as SqlxConnection, Either, Executor, PgConnection, Statement};
use tokio::sync::Mutex;

use self::bind::bind_json;
use self::decode::row_to_json;

use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionProvider};
use crate::error::{AccessorError, Result};
use crate::sql::sanitize::quote_identifier;
use crate::types::Row;

/// One open PostgreSQL connection
///
/// Statements are serialized through an internal lock; the connection never
/// interleaves two statements.
pub struct PgSession {
    conn: Mutex<Option<PgConnection>>,
}

impl PgSession {
    /// Connect and place `schema` on the search path
    pub async fn connect(options: &PgConnectOptions, schema: &str) -> Result<Self> {
        let mut conn = PgConnection::connect_with(options)
            .await
            .map_err(|e| AccessorError::connection(format!("Database connection failed: {}", e)))?;

        let set_search_path = format!("SET search_path TO {}", quote_identifier(schema));
        if let Err(e) = sqlx::query(&set_search_path).execute(&mut conn).await {
            let _ = conn.close().await;
            return Err(AccessorError::connection(format!(
                "Failed to set search_path to '{}': {}",
                schema, e
            )));
        }

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }
}

#[async_trait]
impl Connection for PgSession {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(AccessorError::ConnectionClosed)?;

        tracing::debug!(sql, params = params.len(), "Executing statement");

        let statement = Executor::prepare(&mut *conn, sql).await?;
        let param_types: Vec<PgTypeInfo> = match statement.parameters() {
            Some(Either::Left(types)) => types.to_vec(),
            _ => Vec::new(),
        };

        if param_types.len() != params.len() {
            return Err(AccessorError::invalid_argument(format!(
                "Statement expects {} parameters, got {}",
                param_types.len(),
                params.len()
            )));
        }

        let mut query = statement.query();
        for (i, (value, type_info)) in params.iter().zip(&param_types).enumerate() {
            tracing::trace!(index = i + 1, type_name = %type_info, "Binding parameter");
            query = bind_json(query, i + 1, type_info, value)?;
        }

        let rows = query.fetch_all(&mut *conn).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn end(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

/// Provider that creates one PostgreSQL connection and reuses it until closed
pub struct PgConnectionProvider {
    options: PgConnectOptions,
    schema: String,
    session: Mutex<Option<Arc<PgSession>>>,
}

impl PgConnectionProvider {
    /// Create a provider from explicit configuration
    pub fn new(config: &ConnectionConfig) -> Self {
        Self::from_options(config.to_connect_options(), config.schema.clone())
    }

    /// Create a provider from the `DB_*` environment variables
    ///
    /// Fails before any connection attempt when a variable is missing.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(&ConnectionConfig::from_env()?))
    }

    /// Create a provider from sqlx connect options (e.g. parsed from a URL)
    pub fn from_options(options: PgConnectOptions, schema: impl Into<String>) -> Self {
        Self {
            options,
            schema: schema.into(),
            session: Mutex::new(None),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    async fn get_connection(&self) -> Result<Arc<dyn Connection>> {
        let mut current = self.session.lock().await;

        if let Some(session) = current.as_ref() {
            if !session.is_closed().await {
                let session: Arc<dyn Connection> = session.clone();
                return Ok(session);
            }
        }

        tracing::info!(
            host = self.options.get_host(),
            database = ?self.options.get_database(),
            schema = %self.schema,
            "Connecting to PostgreSQL"
        );

        let session = Arc::new(PgSession::connect(&self.options, &self.schema).await?);
        *current = Some(Arc::clone(&session));
        let session: Arc<dyn Connection> = session;
        Ok(session)
    }

    async fn close_connection(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.end().await?;
            tracing::info!("Closed PostgreSQL connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_keeps_schema() {
        let config = ConnectionConfig::builder().schema("billing").build();
        let provider = PgConnectionProvider::new(&config);
        assert_eq!(provider.schema(), "billing");
    }
}
