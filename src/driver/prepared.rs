//! Parameterized driver with cached prepared statements.

use super::engine::DriverCore;
use super::{Driver, DriverKind};
use crate::config::{ConnectionOptions, DEFAULT_CONNECTION};
use crate::db::executor::StatementCache;
use crate::db::registry::ConnectionRegistry;
use crate::error::DbResult;
use crate::models::{QueryLogEntry, QueryParam, StatementResult};
use crate::query_builder::QueryBuilder;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Driver running statements as server-side prepared statements, cached per
/// connection and reused across calls.
///
/// Connections are created lazily: any name can be used without registering it
/// first, in which case its settings come from the environment.
#[derive(Debug)]
pub struct PreparedDriver {
    core: DriverCore,
}

impl PreparedDriver {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            core: DriverCore::new(DriverKind::Prepared, registry, StatementCache::Cached),
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

    /// Register settings for a named connection.
    pub async fn register(&self, name: &str, options: &ConnectionOptions) -> DbResult<()> {
        self.core.registry().register(name, options).await
    }

    /// Start a query builder for `table` on the named connection.
    pub fn table(&self, table: &str, connection: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table, connection)
    }

    /// Start a query builder for `table` on the default connection.
    pub fn default_table(&self, table: &str) -> QueryBuilder<'_> {
        self.table(table, DEFAULT_CONNECTION)
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

    /// The most recent `limit` logged statements (all when `None`), oldest first.
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
impl Driver for PreparedDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Prepared
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<StatementResult> {
        self.core.run(sql, params, connection).await
    }

    async fn begin(&self, connection: &str) -> DbResult<()> {
        self.core.begin(connection).await
    }

    async fn commit(&self, connection: &str) -> DbResult<()> {
        self.core.commit(connection).await
    }

    async fn rollback(&self, connection: &str) -> DbResult<()> {
        self.core.rollback(connection).await
    }

    async fn transaction_depth(&self, connection: &str) -> DbResult<u32> {
        Ok(self.core.transaction_depth(connection).await)
    }
}
