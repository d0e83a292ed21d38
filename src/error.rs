//! Error types for the database access layer.
//!
//! This module defines all error types using `thiserror`. Every failure path in
//! the drivers, registry and query builder surfaces one of these variants to the
//! immediate caller; nothing is converted into a default value.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection '{connection}' failed: {message}")]
    Connection {
        connection: String,
        message: String,
        suggestion: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Query failed: {message} (sql: {sql})")]
    Query {
        sql: String,
        message: String,
        /// e.g., "23000" for an integrity constraint violation
        sql_state: Option<String>,
    },

    #[error("Driver '{driver}' has not been initialized")]
    Initialization { driver: String },

    #[error("Cannot {operation} at transaction depth {depth}")]
    State { operation: String, depth: u32 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(
        connection: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Connection {
            connection: connection.into(),
            message: message.into(),
            suggestion: suggestion.into(),
            source: None,
        }
    }

    /// Create a connection error that wraps the native driver error.
    pub fn connection_with_source(
        connection: impl Into<String>,
        suggestion: impl Into<String>,
        source: sqlx::Error,
    ) -> Self {
        Self::Connection {
            connection: connection.into(),
            message: source.to_string(),
            suggestion: suggestion.into(),
            source: Some(source),
        }
    }

    /// Create a query error carrying the statement text.
    pub fn query(
        sql: impl Into<String>,
        message: impl Into<String>,
        sql_state: Option<String>,
    ) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.into(),
            sql_state,
        }
    }

    /// Create an initialization error for a driver that was never provisioned.
    pub fn initialization(driver: impl Into<String>) -> Self {
        Self::Initialization {
            driver: driver.into(),
        }
    }

    /// Create a transaction state error.
    pub fn state(operation: impl Into<String>, depth: u32) -> Self {
        Self::State {
            operation: operation.into(),
            depth,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Classify a `sqlx` error raised while running `sql` on `connection`.
    ///
    /// Transport failures become [`DbError::Connection`]; everything the server
    /// or decoder rejected becomes [`DbError::Query`].
    pub fn from_sqlx(sql: &str, connection: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query(sql, db_err.message(), code)
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::connection_with_source(
                connection,
                "Check network connectivity and database server status",
                err,
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::query(sql, format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => DbError::query(
                sql,
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            other => DbError::query(sql, other.to_string(), None),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("default", "Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection 'default' failed"));
    }

    #[test]
    fn test_query_error_carries_sql() {
        let err = DbError::query("SELECT * FROM missing", "no such table", None);
        match &err {
            DbError::Query { sql, message, .. } => {
                assert_eq!(sql, "SELECT * FROM missing");
                assert_eq!(message, "no such table");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert!(err.to_string().contains("SELECT * FROM missing"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("default", "refused", "Start the server");
        assert_eq!(err.suggestion(), Some("Start the server"));
        assert_eq!(DbError::invalid_input("bad").suggestion(), None);
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::connection("default", "err", "sugg").is_retryable());
        assert!(!DbError::state("commit", 0).is_retryable());
        assert!(!DbError::initialization("legacy").is_retryable());
    }

    #[test]
    fn test_from_sqlx_io_is_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = DbError::from_sqlx("SELECT 1", "default", sqlx::Error::Io(io));
        assert!(matches!(err, DbError::Connection { ref connection, .. } if connection == "default"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_sqlx_row_not_found_is_query() {
        let err = DbError::from_sqlx("SELECT 1", "default", sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Query { ref sql, .. } if sql == "SELECT 1"));
    }

    #[test]
    fn test_state_error_display() {
        let err = DbError::state("commit", 0);
        assert_eq!(err.to_string(), "Cannot commit at transaction depth 0");
    }
}
