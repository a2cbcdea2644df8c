//! Error types for table accessor operations

use thiserror::Error;

/// Errors that can occur while discovering tables or running statements
#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Schema discovery failed for table '{table}': {source}")]
    SchemaDiscovery {
        table: String,
        #[source]
        source: Box<AccessorError>,
    },

    #[error("Schema not discovered for table '{0}'. Call add_table first")]
    SchemaNotDiscovered(String),

    #[error("No valid columns for table '{0}'")]
    NoValidColumns(String),

    #[error("Table '{0}' has neither a primary key nor a unique constraint")]
    NoUniqueConstraint(String),

    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported PostgreSQL type '{type_name}' for {target}")]
    UnsupportedType { target: String, type_name: String },

    #[error("Statement on table '{0}' returned no rows")]
    EmptyResult(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl AccessorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn schema_discovery(table: impl Into<String>, source: AccessorError) -> Self {
        Self::SchemaDiscovery {
            table: table.into(),
            source: Box::new(source),
        }
    }

    pub fn unsupported_type(target: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            target: target.into(),
            type_name: type_name.into(),
        }
    }

    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessorError>;
