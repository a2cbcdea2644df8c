//! Mock connection implementation for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use super::{Connection, ConnectionProvider};
use crate::error::{AccessorError, Result};
use crate::types::Row;

/// A statement seen by [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

enum MockResponse {
    Rows(Vec<Row>),
    Error(String),
}

/// Mock connection that records statements and replays scripted responses.
///
/// Responses are consumed in order, one per query. Unscripted queries return
/// no rows.
#[derive(Default)]
pub struct MockConnection {
    executed: RwLock<Vec<ExecutedQuery>>,
    responses: RwLock<VecDeque<MockResponse>>,
    ended: RwLock<bool>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue rows for the next unanswered query.
    pub async fn push_rows(&self, rows: Vec<Value>) {
        let rows = rows.into_iter().map(into_row).collect();
        self.responses.write().await.push_back(MockResponse::Rows(rows));
    }

    /// Queue a database failure for the next unanswered query.
    pub async fn push_error(&self, message: impl Into<String>) {
        self.responses
            .write()
            .await
            .push_back(MockResponse::Error(message.into()));
    }

    /// Queue the three catalog answers `add_table` expects.
    pub async fn push_catalog(&self, columns: &[&str], unique: &[&str], primary_key: &[&str]) {
        for names in [columns, unique, primary_key] {
            self.push_rows(
                names
                    .iter()
                    .map(|name| json!({ "column_name": name }))
                    .collect(),
            )
            .await;
        }
    }

    pub async fn executed(&self) -> Vec<ExecutedQuery> {
        self.executed.read().await.clone()
    }

    pub async fn last_executed(&self) -> Option<ExecutedQuery> {
        self.executed.read().await.last().cloned()
    }

    pub async fn executed_count(&self) -> usize {
        self.executed.read().await.len()
    }

    pub async fn is_ended(&self) -> bool {
        *self.ended.read().await
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        if *self.ended.read().await {
            return Err(AccessorError::ConnectionClosed);
        }

        self.executed.write().await.push(ExecutedQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        match self.responses.write().await.pop_front() {
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Error(message)) => {
                Err(AccessorError::Sql(sqlx::Error::Protocol(message)))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn end(&self) -> Result<()> {
        *self.ended.write().await = true;
        Ok(())
    }
}

/// Mock provider handing out one shared [`MockConnection`].
#[derive(Default)]
pub struct MockConnectionProvider {
    connection: Arc<MockConnection>,
    connects: RwLock<usize>,
    closes: RwLock<usize>,
    fail_on_connect: RwLock<bool>,
}

impl MockConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection every `get_connection` call returns.
    pub fn connection(&self) -> Arc<MockConnection> {
        Arc::clone(&self.connection)
    }

    pub async fn set_fail_on_connect(&self, fail: bool) {
        *self.fail_on_connect.write().await = fail;
    }

    pub async fn connect_count(&self) -> usize {
        *self.connects.read().await
    }

    pub async fn close_count(&self) -> usize {
        *self.closes.read().await
    }
}

#[async_trait]
impl ConnectionProvider for MockConnectionProvider {
    async fn get_connection(&self) -> Result<Arc<dyn Connection>> {
        if *self.fail_on_connect.read().await {
            return Err(AccessorError::connection("Mock connect failure"));
        }
        *self.connects.write().await += 1;
        let connection: Arc<dyn Connection> = self.connection.clone();
        Ok(connection)
    }

    async fn close_connection(&self) -> Result<()> {
        *self.closes.write().await += 1;
        self.connection.end().await
    }
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("?column?".to_string(), other);
            row
        }
    }
}
