//! Connection-related data models.
//!
//! This module defines the resolved connection configuration and the supported
//! database backends.

use crate::config::{
    ConnectionOptions, DEFAULT_CHARSET, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST,
    DEFAULT_MYSQL_PORT, Environment, env_keys,
};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Supported database types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    #[default]
    #[value(name = "mysql", alias = "mariadb")]
    MySQL,
    #[value(name = "sqlite", alias = "sqlite3")]
    SQLite,
}

impl DatabaseType {
    /// Parse a database type from a driver name such as `mysql` or `sqlite`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySQL => Some(DEFAULT_MYSQL_PORT),
            Self::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Fully resolved configuration for one named connection.
#[derive(Clone, Serialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    pub host: String,
    pub port: u16,
    /// Database name for MySQL, file path (or `:memory:`) for SQLite.
    pub database: String,
    pub username: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub password: String,
    pub charset: String,
    pub collation: Option<String>,
    /// When false, the handle keeps no prepared-statement cache.
    pub persistent: bool,
    pub connect_timeout: Duration,
    /// Driver-specific options (MySQL URL parameters, SQLite pragmas).
    pub options: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Resolve a configuration: supplied fields win over environment variables,
    /// which win over the built-in defaults.
    ///
    /// Credentials and the database name have no default; when they are missing
    /// everywhere a configuration error is returned.
    pub fn resolve(options: &ConnectionOptions, env: &Environment) -> DbResult<Self> {
        let db_type = match options.driver {
            Some(db_type) => db_type,
            None => match env.var(env_keys::DRIVER) {
                Some(name) => DatabaseType::from_name(&name).ok_or_else(|| {
                    DbError::configuration(format!(
                        "Unknown driver '{}' in {}",
                        name,
                        env_keys::DRIVER
                    ))
                })?,
                None => DatabaseType::default(),
            },
        };

        let pick = |supplied: &Option<String>, key: &str| {
            supplied.clone().or_else(|| env.var(key))
        };
        let required = |supplied: &Option<String>, key: &str, field: &str| {
            pick(supplied, key).ok_or_else(|| {
                DbError::configuration(format!(
                    "Missing required setting '{}' (set it in the configuration or {})",
                    field, key
                ))
            })
        };

        let port = match options.port {
            Some(port) => port,
            None => match env.var(env_keys::PORT) {
                Some(raw) => raw.parse().map_err(|_| {
                    DbError::configuration(format!("Invalid {}: {}", env_keys::PORT, raw))
                })?,
                None => db_type.default_port().unwrap_or_default(),
            },
        };

        let persistent = match options.persistent {
            Some(flag) => flag,
            None => match env.var(env_keys::PERSISTENT) {
                Some(raw) => parse_flag(&raw).ok_or_else(|| {
                    DbError::configuration(format!("Invalid {}: {}", env_keys::PERSISTENT, raw))
                })?,
                None => true,
            },
        };

        let connect_timeout_secs = match options.connect_timeout_secs {
            Some(secs) => secs,
            None => match env.var(env_keys::CONNECT_TIMEOUT) {
                Some(raw) => raw.parse().map_err(|_| {
                    DbError::configuration(format!(
                        "Invalid {}: {}",
                        env_keys::CONNECT_TIMEOUT,
                        raw
                    ))
                })?,
                None => DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        };

        let database = required(&options.database, env_keys::DATABASE, "database")?;
        let (username, password) = match db_type {
            DatabaseType::MySQL => (
                required(&options.username, env_keys::USERNAME, "username")?,
                required(&options.password, env_keys::PASSWORD, "password")?,
            ),
            DatabaseType::SQLite => (
                pick(&options.username, env_keys::USERNAME).unwrap_or_default(),
                pick(&options.password, env_keys::PASSWORD).unwrap_or_default(),
            ),
        };

        Ok(Self {
            db_type,
            host: pick(&options.host, env_keys::HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database,
            username,
            password,
            charset: pick(&options.charset, env_keys::CHARSET)
                .unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
            collation: pick(&options.collation, env_keys::COLLATION),
            persistent,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            options: options.driver_options(),
        })
    }

    /// Build the MySQL connection URL (credentials percent-encoded, driver
    /// options appended as query parameters).
    pub fn mysql_url(&self) -> DbResult<Url> {
        let mut url = Url::parse("mysql://localhost")
            .map_err(|e| DbError::configuration(format!("Invalid base URL: {}", e)))?;
        url.set_host(Some(&self.host))
            .map_err(|e| DbError::configuration(format!("Invalid host '{}': {}", self.host, e)))?;
        url.set_port(Some(self.port))
            .map_err(|_| DbError::configuration("Cannot set port on MySQL URL"))?;
        url.set_username(&self.username)
            .map_err(|_| DbError::configuration("Cannot set username on MySQL URL"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| DbError::configuration("Cannot set password on MySQL URL"))?;
        }
        url.set_path(&self.database);
        if !self.options.is_empty() {
            url.query_pairs_mut().extend_pairs(self.options.iter());
        }
        Ok(url)
    }

    /// Get a display-safe description of the target (credentials masked).
    pub fn masked_url(&self) -> String {
        match self.db_type {
            DatabaseType::SQLite => format!("sqlite:{}", self.database),
            DatabaseType::MySQL => match self.mysql_url() {
                Ok(mut url) => {
                    if url.password().is_some() {
                        let _ = url.set_password(Some("****"));
                    }
                    url.to_string()
                }
                Err(_) => format!("mysql://{}:{}/{}", self.host, self.port, self.database),
            },
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"****")
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .field("persistent", &self.persistent)
            .field("connect_timeout", &self.connect_timeout)
            .field("options", &self.options)
            .finish()
    }
}

/// Parse a boolean flag as written in environment variables.
pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
