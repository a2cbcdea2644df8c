//! # runtara-table-accessor
//!
//! Catalog-driven CRUD and upsert over existing PostgreSQL tables.
//!
//! Tables are opted in by name. Their columns, unique columns and primary key
//! are discovered from `information_schema` and cached, and every statement the
//! accessor builds is derived from that metadata: record keys that are not
//! columns are dropped, condition fields must be columns, and all values are
//! bound as parameters.
//!
//! ## Features
//!
//! - **Schema Discovery**: Columns, UNIQUE and PRIMARY KEY columns per table
//! - **Upsert**: `INSERT .. ON CONFLICT .. DO UPDATE` on the primary key, or the unique columns
//! - **Filtered CRUD**: Read, update and delete with ordered, operator-aware conditions
//! - **Record Flattening**: Nested camelCase objects map onto snake_case columns
//! - **Typed Values**: JSON bound and decoded per column type, including intervals, network
//!   addresses, bytea and arrays (see [`postgres`])
//! - **Pluggable Connections**: The accessor talks to a [`ConnectionProvider`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use runtara_table_accessor::{Conditions, ConnectionConfig, Operator, PgConnectionProvider, TableAccessor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder()
//!         .user("app")
//!         .password("secret")
//!         .database("shop")
//!         .schema("public")
//!         .build();
//!
//!     let mut accessor = TableAccessor::new(Arc::new(PgConnectionProvider::new(&config)));
//!     accessor.add_table("users").await?;
//!
//!     // Nested keys flatten to `profile_first_name`
//!     let user = accessor
//!         .upsert(
//!             "users",
//!             &serde_json::json!({ "email": "a@b.com", "profile": { "firstName": "Ada" } }),
//!             &Conditions::new(),
//!         )
//!         .await?;
//!
//!     let adults = accessor
//!         .read("users", &Conditions::new().compare("age", Operator::Gte, 18))
//!         .await?;
//!
//!     println!("{} -> {} adults", user["id"], adults.len());
//!     accessor.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! [`ConnectionConfig::from_env`] reads `DB_USER`, `DB_PASSWORD`, `DB_HOST`,
//! `DB_PORT`, `DB_NAME` and `DB_SCHEMA`, loading a `.env` file first when one
//! exists. All six are required.
//!
//! ## Raw SQL
//!
//! [`TableAccessor::raw_query`] runs caller-written SQL unchanged and offers no
//! injection protection; pass dynamic values as parameters.

pub mod accessor;
pub mod config;
pub mod connection;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod postgres;
pub mod sql;
pub mod types;

// Re-export main types for convenience
pub use accessor::TableAccessor;
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::{Connection, ConnectionProvider};
pub use error::{AccessorError, Result};
pub use metadata::TableMetadata;
pub use naming::{FlatRecord, flatten, flatten_opt, to_snake_case};
pub use postgres::{PgConnectionProvider, PgSession};
pub use types::{Condition, Conditions, Operator, Row};

// Re-export SQL utilities for advanced users
pub use sql::{build_condition_clause, quote_identifier, render_identifier};
