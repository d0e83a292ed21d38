//! Live connection handles.
//!
//! A [`DbConnection`] wraps one database-specific `sqlx` connection. Single
//! connections are used instead of pools: nested transactions need every
//! statement of a transaction to run on the same session.

use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{ConnectionConfig, DatabaseType};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::borrow::Cow;
use std::str::FromStr;
use tracing::debug;

/// Database-specific connection (avoids `AnyConnection` limitations).
#[derive(Debug)]
pub enum DbConnection {
    MySql(MySqlConnection),
    SQLite(SqliteConnection),
}

impl DbConnection {
    /// Open a new connection for the named slot.
    pub async fn connect(name: &str, config: &ConnectionConfig) -> DbResult<Self> {
        let timeout = config.connect_timeout;
        let attempt = async {
            match config.db_type {
                DatabaseType::MySQL => {
                    let options = mysql_options(name, config)?;
                    options
                        .connect()
                        .await
                        .map(DbConnection::MySql)
                        .map_err(|e| connect_error(name, config.db_type, e))
                }
                DatabaseType::SQLite => {
                    let options = sqlite_options(name, config)?;
                    options
                        .connect()
                        .await
                        .map(DbConnection::SQLite)
                        .map_err(|e| connect_error(name, config.db_type, e))
                }
            }
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(DbError::connection(
                name,
                format!("Timed out after {}s", timeout.as_secs()),
                connection_suggestion(config.db_type, None),
            )),
        }
    }

    /// Get the database type for this connection.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Liveness probe: one trivial round trip to the server.
    pub async fn ping(&mut self) -> Result<(), sqlx::Error> {
        impl_db_dispatch!(self, {
            MySql(c) => c.ping().await,
            SQLite(c) => c.ping().await,
        })
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        impl_db_dispatch!(self, {
            MySql(c) => c.close().await,
            SQLite(c) => c.close().await,
        })
    }
}

fn mysql_options(name: &str, config: &ConnectionConfig) -> DbResult<MySqlConnectOptions> {
    let url = config.mysql_url()?;
    let mut options = MySqlConnectOptions::from_str(url.as_str())
        .map_err(|e| {
            DbError::connection_with_source(
                name,
                "Check the host, port, database and driver options",
                e,
            )
        })?
        .charset(&config.charset);

    if let Some(collation) = &config.collation {
        options = options.collation(collation);
    }
    if !config.persistent {
        options = options.statement_cache_capacity(0);
    }

    debug!(connection = %name, target = %config.masked_url(), "MySQL connect options built");
    Ok(options)
}

fn sqlite_options(name: &str, config: &ConnectionConfig) -> DbResult<SqliteConnectOptions> {
    let mut options = if config.database == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            DbError::connection_with_source(name, "Check the SQLite database path", e)
        })?
    } else {
        SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(true)
    };

    for (key, value) in &config.options {
        options = options.pragma(
            Cow::<'static, str>::Owned(key.clone()),
            Cow::<'static, str>::Owned(value.clone()),
        );
    }
    if !config.persistent {
        options = options.statement_cache_capacity(0);
    }

    debug!(connection = %name, target = %config.masked_url(), "SQLite connect options built");
    Ok(options)
}

fn connect_error(name: &str, db_type: DatabaseType, error: sqlx::Error) -> DbError {
    let suggestion = connection_suggestion(db_type, Some(&error));
    DbError::connection_with_source(name, suggestion, error)
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: Option<&sqlx::Error>) -> String {
    let error_str = error.map(|e| e.to_string().to_lowercase()).unwrap_or_default();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("access denied") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    match db_type {
        DatabaseType::MySQL => {
            "Verify DB_HOST, DB_PORT and network access to the MySQL server".to_string()
        }
        DatabaseType::SQLite => {
            "Verify the file path exists and is accessible".to_string()
        }
    }
}
