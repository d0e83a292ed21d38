//! Typed-binding driver.
//!
//! Low-level execution takes a type-code string with one code per bound value
//! (`i` integer, `d` double, `s` string, `b` blob) and coerces each value to its
//! declared type before binding. Statements are not cached on the server.
//!
//! The driver is never initialized implicitly: every operation fails until
//! [`LegacyDriver::provision`] has been called.

use super::engine::DriverCore;
use super::{Driver, DriverKind};
use crate::config::ConnectionOptions;
use crate::db::executor::StatementCache;
use crate::db::params::{apply_type_codes, infer_type_codes};
use crate::db::registry::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryLogEntry, QueryParam, StatementResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

#[derive(Debug)]
pub struct LegacyDriver {
    core: DriverCore,
    provisioned: AtomicBool,
}

impl LegacyDriver {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            core: DriverCore::new(DriverKind::Legacy, registry, StatementCache::Uncached),
            provisioned: AtomicBool::new(false),
        }
    }

    /// Set the query log capacity at construction time.
    pub fn with_query_log_capacity(mut self, capacity: usize) -> Self {
        self.core.query_log_mut().set_capacity(capacity);
        self
    }

    /// Number query log entries from a counter shared with other drivers.
    pub fn with_log_sequence(mut self, sequence: Arc<AtomicU64>) -> Self {
        self.core.query_log_mut().share_sequence(sequence);
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.core.registry()
    }

    /// Register a connection and enable the driver.
    ///
    /// Provisioning the same name again replaces its settings while the
    /// connection is not yet open.
    pub async fn provision(&self, name: &str, options: &ConnectionOptions) -> DbResult<()> {
        self.core.registry().register(name, options).await?;
        if !self.provisioned.swap(true, Ordering::AcqRel) {
            info!(connection = %name, "Legacy driver provisioned");
        }
        Ok(())
    }

    pub fn is_provisioned(&self) -> bool {
        self.provisioned.load(Ordering::Acquire)
    }

    /// Execute with an explicit type-code string, one code per parameter.
    pub async fn execute_typed(
        &self,
        sql: &str,
        types: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<StatementResult> {
        self.check_initialized()?;
        let bound = apply_type_codes(types, params)?;
        self.core.run(sql, &bound, connection).await
    }

    /// Escape `value` for inclusion in a string literal on the connection's backend.
    pub async fn escape(&self, value: &str, connection: &str) -> DbResult<String> {
        self.check_initialized()?;
        let guard = self.core.registry().acquire(connection).await?;
        Ok(escape_for(guard.db_type(), value))
    }

    pub async fn set_logging(&self, enabled: bool) {
        self.core.set_logging(enabled).await;
    }

    pub async fn is_logging(&self) -> bool {
        self.core.is_logging().await
    }

    pub async fn set_query_log_capacity(&self, capacity: usize) {
        self.core.set_query_log_capacity(capacity).await;
    }

    pub async fn query_log(&self, limit: Option<usize>) -> Vec<QueryLogEntry> {
        self.core.query_log(limit).await
    }

    pub async fn clear_query_log(&self) {
        self.core.clear_query_log().await;
    }

    /// Close every open handle of this driver.
    pub async fn close(&self) {
        self.core.registry().close_all().await;
    }
}

#[async_trait]
impl Driver for LegacyDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Legacy
    }

    fn check_initialized(&self) -> DbResult<()> {
        if self.is_provisioned() {
            Ok(())
        } else {
            Err(DbError::initialization(DriverKind::Legacy.name()))
        }
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<StatementResult> {
        let types = infer_type_codes(params);
        self.execute_typed(sql, &types, params, connection).await
    }

    async fn begin(&self, connection: &str) -> DbResult<()> {
        self.check_initialized()?;
        self.core.begin(connection).await
    }

    async fn commit(&self, connection: &str) -> DbResult<()> {
        self.check_initialized()?;
        self.core.commit(connection).await
    }

    async fn rollback(&self, connection: &str) -> DbResult<()> {
        self.check_initialized()?;
        self.core.rollback(connection).await
    }

    async fn transaction_depth(&self, connection: &str) -> DbResult<u32> {
        self.check_initialized()?;
        Ok(self.core.transaction_depth(connection).await)
    }
}

/// Escape a string literal body for the given backend.
pub fn escape_for(db_type: DatabaseType, value: &str) -> String {
    match db_type {
        DatabaseType::MySQL => escape_mysql(value),
        DatabaseType::SQLite => escape_sqlite(value),
    }
}

/// MySQL escaping: backslash before NUL, LF, CR, `\`, `'`, `"` and Ctrl-Z.
pub fn escape_mysql(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + value.len() / 8);
    for c in value.chars() {
        match c {
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\x1a' => escaped.push_str("\\Z"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// SQLite escaping: single quotes are doubled.
pub fn escape_sqlite(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryFaultSink;
    use crate::config::{DEFAULT_CONNECTION, Environment};
    use std::sync::Arc;

    fn driver() -> LegacyDriver {
        LegacyDriver::new(ConnectionRegistry::new(
            Environment::empty(),
            Arc::new(MemoryFaultSink::new()),
        ))
    }

    #[test]
    fn test_escape_mysql() {
        assert_eq!(escape_mysql("O'Brien"), "O\\'Brien");
        assert_eq!(escape_mysql("a\\b"), "a\\\\b");
        assert_eq!(escape_mysql("line\nbreak\r"), "line\\nbreak\\r");
        assert_eq!(escape_mysql("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_mysql("nul\0ctrl\x1a"), "nul\\0ctrl\\Z");
        assert_eq!(escape_mysql("plain"), "plain");
    }

    #[test]
    fn test_escape_sqlite() {
        assert_eq!(escape_sqlite("O'Brien"), "O''Brien");
        assert_eq!(escape_sqlite("back\\slash"), "back\\slash");
    }

    #[tokio::test]
    async fn test_operations_require_provisioning() {
        let db = driver();
        assert!(matches!(
            db.execute("SELECT 1", &[], DEFAULT_CONNECTION).await,
            Err(DbError::Initialization { .. })
        ));
        assert!(matches!(
            db.insert("t", &[("a", QueryParam::Int(1))], DEFAULT_CONNECTION).await,
            Err(DbError::Initialization { .. })
        ));
        assert!(matches!(
            db.escape("x", DEFAULT_CONNECTION).await,
            Err(DbError::Initialization { .. })
        ));
        assert!(matches!(
            db.begin(DEFAULT_CONNECTION).await,
            Err(DbError::Initialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_typed_coerces_values() {
        let db = driver();
        db.provision(DEFAULT_CONNECTION, &ConnectionOptions::sqlite(":memory:"))
            .await
            .unwrap();
        assert!(db.is_provisioned());

        let row = db
            .execute_typed(
                "SELECT ? + 1 AS n, ? AS s",
                "is",
                &[QueryParam::from("41"), QueryParam::Int(7)],
                DEFAULT_CONNECTION,
            )
            .await
            .unwrap()
            .into_first_row()
            .unwrap();
        assert_eq!(row["n"], serde_json::json!(42));
        assert_eq!(row["s"], serde_json::json!("7"));
    }

    #[tokio::test]
    async fn test_execute_typed_rejects_bad_codes() {
        let db = driver();
        db.provision(DEFAULT_CONNECTION, &ConnectionOptions::sqlite(":memory:"))
            .await
            .unwrap();

        let mismatch = db
            .execute_typed("SELECT ?", "ii", &[QueryParam::Int(1)], DEFAULT_CONNECTION)
            .await;
        assert!(matches!(mismatch, Err(DbError::InvalidInput { .. })));

        let unknown = db
            .execute_typed("SELECT ?", "x", &[QueryParam::Int(1)], DEFAULT_CONNECTION)
            .await;
        assert!(matches!(unknown, Err(DbError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_escape_uses_connection_backend() {
        let db = driver();
        db.provision(DEFAULT_CONNECTION, &ConnectionOptions::sqlite(":memory:"))
            .await
            .unwrap();
        assert_eq!(
            db.escape("it's", DEFAULT_CONNECTION).await.unwrap(),
            "it''s"
        );
    }
}
