//! Configuration handling for the database layer.
//!
//! Connection settings arrive from a configuration collaborator (`ConfigSource`)
//! as a partial record. Missing fields fall back to environment variables and
//! then to the defaults below. Credentials never have a default.

use crate::error::DbResult;
use crate::models::DatabaseType;
use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_CONNECTION: &str = "default";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_CHARSET: &str = "utf8mb4";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_LOG_CAPACITY: usize = 100;

/// Environment variable names consulted when a field is not supplied.
pub mod env_keys {
    pub const DRIVER: &str = "DB_DRIVER";
    pub const HOST: &str = "DB_HOST";
    pub const PORT: &str = "DB_PORT";
    pub const DATABASE: &str = "DB_DATABASE";
    pub const USERNAME: &str = "DB_USERNAME";
    pub const PASSWORD: &str = "DB_PASSWORD";
    pub const CHARSET: &str = "DB_CHARSET";
    pub const COLLATION: &str = "DB_COLLATION";
    pub const PERSISTENT: &str = "DB_PERSISTENT";
    pub const CONNECT_TIMEOUT: &str = "DB_CONNECT_TIMEOUT";
}

/// Source of environment variables used for configuration fallback.
#[derive(Clone, Default)]
pub enum Environment {
    /// Read from the process environment.
    #[default]
    Process,
    /// A fixed set of variables (tests, embedded configuration).
    Fixed(HashMap<String, String>),
}

impl Environment {
    /// An environment with no variables set.
    pub fn empty() -> Self {
        Self::Fixed(HashMap::new())
    }

    /// An environment made of the given key/value pairs.
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Look up a variable.
    pub fn var(&self, key: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(key).ok(),
            Self::Fixed(vars) => vars.get(key).cloned(),
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "Process"),
            Self::Fixed(vars) => {
                let mut keys: Vec<&String> = vars.keys().collect();
                keys.sort();
                f.debug_tuple("Fixed").field(&keys).finish()
            }
        }
    }
}

/// Connection settings as supplied by the configuration collaborator.
///
/// Every field is optional; see [`crate::models::ConnectionConfig::resolve`]
/// for the fallback order.
#[derive(Clone, Default, Serialize, Deserialize, Args)]
pub struct ConnectionOptions {
    /// Database driver: mysql or sqlite
    #[arg(long = "db-driver", value_enum, env = "DB_DRIVER")]
    #[serde(default)]
    pub driver: Option<DatabaseType>,

    /// Database server host
    #[arg(long = "db-host", env = "DB_HOST")]
    #[serde(default)]
    pub host: Option<String>,

    /// Database server port
    #[arg(long = "db-port", env = "DB_PORT")]
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name (file path for SQLite)
    #[arg(long = "db-database", env = "DB_DATABASE")]
    #[serde(default)]
    pub database: Option<String>,

    #[arg(long = "db-username", env = "DB_USERNAME")]
    #[serde(default)]
    pub username: Option<String>,

    #[arg(long = "db-password", env = "DB_PASSWORD", hide_env_values = true)]
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Connection character set (default: utf8mb4)
    #[arg(long = "db-charset", env = "DB_CHARSET")]
    #[serde(default)]
    pub charset: Option<String>,

    #[arg(long = "db-collation", env = "DB_COLLATION")]
    #[serde(default)]
    pub collation: Option<String>,

    /// Keep a prepared-statement cache on each handle (default: true)
    #[arg(long = "db-persistent", env = "DB_PERSISTENT")]
    #[serde(default)]
    pub persistent: Option<bool>,

    /// Connect timeout in seconds (default: 10)
    #[arg(long = "db-connect-timeout", env = "DB_CONNECT_TIMEOUT")]
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// Driver-specific option as key=value. Can be specified multiple times.
    #[arg(long = "db-option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    #[serde(default)]
    pub options: Vec<(String, String)>,
}

impl ConnectionOptions {
    /// Options for a SQLite database file (or `:memory:`).
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Some(DatabaseType::SQLite),
            database: Some(path.into()),
            ..Self::default()
        }
    }

    /// Options for a MySQL database on the default host and port.
    pub fn mysql(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            driver: Some(DatabaseType::MySQL),
            database: Some(database.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Add a driver-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Driver-specific options keyed by name; later entries win.
    pub fn driver_options(&self) -> BTreeMap<String, String> {
        self.options.iter().cloned().collect()
    }
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .field("persistent", &self.persistent)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("options", &self.options)
            .finish()
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty option name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Query log settings applied by the facade on initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLogSettings {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for QueryLogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_QUERY_LOG_CAPACITY,
        }
    }
}

/// Configuration collaborator consulted by [`crate::Database::init`].
pub trait ConfigSource: Send + Sync {
    /// Load the options for the default connection.
    fn load(&self) -> DbResult<ConnectionOptions>;

    /// Query log settings. Logging is off unless a source enables it.
    fn query_log(&self) -> QueryLogSettings {
        QueryLogSettings::default()
    }
}

impl ConfigSource for ConnectionOptions {
    fn load(&self) -> DbResult<ConnectionOptions> {
        Ok(self.clone())
    }
}

/// Settings for applications embedding the database layer.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-layer",
    about = "Database access layer settings",
    version,
    author
)]
pub struct Settings {
    #[command(flatten)]
    pub connection: ConnectionOptions,

    /// Record executed statements in the in-memory query log
    #[arg(long, env = "DB_QUERY_LOG")]
    pub query_log: bool,

    /// Number of statements kept in the query log
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_LOG_CAPACITY,
        env = "DB_QUERY_LOG_CAPACITY"
    )]
    pub query_log_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_JSON_LOGS")]
    pub json_logs: bool,
}

impl Settings {
    /// Parse settings from command line arguments and environment variables.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            query_log: false,
            query_log_capacity: DEFAULT_QUERY_LOG_CAPACITY,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ConfigSource for Settings {
    fn load(&self) -> DbResult<ConnectionOptions> {
        Ok(self.connection.clone())
    }

    fn query_log(&self) -> QueryLogSettings {
        QueryLogSettings {
            enabled: self.query_log,
            capacity: self.query_log_capacity,
        }
    }
}
