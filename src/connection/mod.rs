//! Connection seam between the accessor and the database driver.
//!
//! [`TableAccessor`](crate::TableAccessor) only talks to these traits. The
//! PostgreSQL implementation lives in [`crate::postgres`]; [`mock`] provides a
//! recording substitute for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::Row;

pub mod mock;

/// A live database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run one parameterized statement and return every row it produced.
    ///
    /// `params` bind to `$1..$n` in order.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Close the connection. Later queries fail.
    async fn end(&self) -> Result<()>;
}

/// Creates or reuses the shared connection.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Return the shared connection, connecting first if none is open.
    async fn get_connection(&self) -> Result<Arc<dyn Connection>>;

    /// Close the shared connection if one is open.
    async fn close_connection(&self) -> Result<()>;
}
