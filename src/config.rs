//! Connection configuration
//!
//! Provides a builder and environment loading for the PostgreSQL connection
//! parameters used by [`PgConnectionProvider`](crate::postgres::PgConnectionProvider).

use std::fmt;

use sqlx::postgres::PgConnectOptions;

use crate::error::{AccessorError, Result};

/// Environment variable holding the database user
pub const ENV_USER: &str = "DB_USER";
/// Environment variable holding the database password
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
/// Environment variable holding the database host
pub const ENV_HOST: &str = "DB_HOST";
/// Environment variable holding the database port
pub const ENV_PORT: &str = "DB_PORT";
/// Environment variable holding the database name
pub const ENV_DATABASE: &str = "DB_NAME";
/// Environment variable holding the schema placed on the search path
pub const ENV_SCHEMA: &str = "DB_SCHEMA";

/// Parameters for the single PostgreSQL connection
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Schema set as `search_path` once connected
    pub schema: String,
}

impl ConnectionConfig {
    /// Create a new configuration builder
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Load the configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// Every variable is required; all missing names are reported together.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut get = |key: &'static str| match lookup(key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                missing.push(key);
                String::new()
            }
        };

        let user = get(ENV_USER);
        let password = get(ENV_PASSWORD);
        let host = get(ENV_HOST);
        let port = get(ENV_PORT);
        let database = get(ENV_DATABASE);
        let schema = get(ENV_SCHEMA);

        if !missing.is_empty() {
            return Err(AccessorError::configuration(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let port = port.parse::<u16>().map_err(|_| {
            AccessorError::configuration(format!("{} must be a port number, got '{}'", ENV_PORT, port))
        })?;

        Ok(Self {
            user,
            password,
            host,
            port,
            database,
            schema,
        })
    }

    /// Build sqlx connect options from this configuration
    pub fn to_connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Builder for ConnectionConfig
#[derive(Debug)]
pub struct ConnectionConfigBuilder {
    user: String,
    password: String,
    host: String,
    port: u16,
    database: String,
    schema: String,
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionConfigBuilder {
    /// Create a builder for a local `postgres` database on the `public` schema
    pub fn new() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            schema: "public".to_string(),
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the schema placed on the search path (default: "public")
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            user: self.user,
            password: self.password,
            host: self.host,
            port: self.port,
            database: self.database,
            schema: self.schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_USER, "app"),
            (ENV_PASSWORD, "secret"),
            (ENV_HOST, "db.internal"),
            (ENV_PORT, "6432"),
            (ENV_DATABASE, "inventory"),
            (ENV_SCHEMA, "sales"),
        ])
    }

    fn lookup_in(env: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| env.get(key).map(|v| v.to_string())
    }

    // =========================================================================
    // Environment Resolution Tests
    // =========================================================================

    #[test]
    fn test_from_lookup_all_present() {
        let config = ConnectionConfig::from_lookup(lookup_in(full_env())).unwrap();

        assert_eq!(config.user, "app");
        assert_eq!(config.password, "secret");
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6432);
        assert_eq!(config.database, "inventory");
        assert_eq!(config.schema, "sales");
    }

    #[test]
    fn test_from_lookup_reports_every_missing_variable() {
        let mut env = full_env();
        env.remove(ENV_PASSWORD);
        env.remove(ENV_SCHEMA);

        let err = ConnectionConfig::from_lookup(lookup_in(env)).unwrap_err();
        match err {
            AccessorError::Configuration(msg) => {
                assert!(msg.contains(ENV_PASSWORD));
                assert!(msg.contains(ENV_SCHEMA));
                assert!(!msg.contains(ENV_HOST));
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_lookup_empty_value_is_missing() {
        let mut env = full_env();
        env.insert(ENV_HOST, "");

        let err = ConnectionConfig::from_lookup(lookup_in(env)).unwrap_err();
        assert!(matches!(err, AccessorError::Configuration(msg) if msg.contains(ENV_HOST)));
    }

    #[test]
    fn test_from_lookup_invalid_port() {
        let mut env = full_env();
        env.insert(ENV_PORT, "not-a-port");

        let err = ConnectionConfig::from_lookup(lookup_in(env)).unwrap_err();
        assert!(matches!(err, AccessorError::Configuration(msg) if msg.contains("not-a-port")));
    }

    // =========================================================================
    // Builder Tests
    // =========================================================================

    #[test]
    fn test_builder_defaults() {
        let config = ConnectionConfig::builder().build();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.schema, "public");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConnectionConfig::builder()
            .user("svc")
            .password("pw")
            .host("10.0.0.5")
            .port(15432)
            .database("orders")
            .schema("billing")
            .build();

        assert_eq!(config.user, "svc");
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 15432);
        assert_eq!(config.database, "orders");
        assert_eq!(config.schema, "billing");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::builder().password("hunter2").build();
        let debug_str = format!("{:?}", config);

        assert!(debug_str.contains("ConnectionConfig"));
        assert!(!debug_str.contains("hunter2"));
    }
}
