//! Execution machinery shared by both drivers.

use crate::db::executor::{self, StatementCache};
use crate::db::query_log::QueryLog;
use crate::db::registry::{ConnectionGuard, ConnectionRegistry};
use crate::db::transaction::TransactionStep;
use crate::driver::DriverKind;
use crate::error::{DbError, DbResult};
use crate::models::{QueryLogEntry, QueryParam, StatementResult};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A connection registry, a query log and the statement cache policy.
#[derive(Debug)]
pub(crate) struct DriverCore {
    kind: DriverKind,
    registry: ConnectionRegistry,
    cache: StatementCache,
    log: Mutex<QueryLog>,
}

impl DriverCore {
    pub fn new(kind: DriverKind, registry: ConnectionRegistry, cache: StatementCache) -> Self {
        Self {
            kind,
            registry,
            cache,
            log: Mutex::new(QueryLog::default()),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn query_log_mut(&mut self) -> &mut QueryLog {
        self.log.get_mut()
    }

    /// Run one statement on `connection`.
    pub async fn run(
        &self,
        sql: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<StatementResult> {
        let mut guard = self.registry.acquire(connection).await?;
        self.run_on(&mut guard, sql, params).await
    }

    async fn run_on(
        &self,
        guard: &mut ConnectionGuard,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<StatementResult> {
        let started = Instant::now();
        let outcome = executor::run(guard.connection()?, sql, params, self.cache).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(result) => {
                debug!(
                    driver = %self.kind,
                    connection = %guard.name(),
                    sql = %sql,
                    params = params.len(),
                    rows = result.row_count(),
                    rows_affected = result.rows_affected,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Statement executed"
                );
                self.log.lock().await.record(sql, params, elapsed);
                Ok(result)
            }
            Err(e) => {
                let err = DbError::from_sqlx(sql, guard.name(), e);
                if matches!(err, DbError::Connection { .. }) {
                    guard.mark_suspect();
                }
                debug!(driver = %self.kind, connection = %guard.name(), error = %err, "Statement failed");
                Err(err)
            }
        }
    }

    pub async fn begin(&self, connection: &str) -> DbResult<()> {
        let mut guard = self.registry.acquire(connection).await?;
        let step = guard.transaction().plan_begin();
        self.apply(&mut guard, step).await
    }

    pub async fn commit(&self, connection: &str) -> DbResult<()> {
        let mut guard = self.registry.acquire(connection).await?;
        let step = guard.transaction().plan_commit()?;
        self.apply(&mut guard, step).await
    }

    pub async fn rollback(&self, connection: &str) -> DbResult<()> {
        let mut guard = self.registry.acquire(connection).await?;
        let step = guard.transaction().plan_rollback()?;
        self.apply(&mut guard, step).await
    }

    pub async fn transaction_depth(&self, connection: &str) -> u32 {
        self.registry.transaction_depth(connection).await
    }

    /// Issue the statement for `step`, then record it in the slot's state.
    async fn apply(&self, guard: &mut ConnectionGuard, step: TransactionStep) -> DbResult<()> {
        if let Some(sql) = step.sql() {
            self.run_on(guard, &sql, &[]).await?;
        }

        let (_, transaction) = guard.parts()?;
        transaction.apply(&step);
        let depth = transaction.depth();

        if step.is_outermost() {
            info!(driver = %self.kind, connection = %guard.name(), step = ?step, "Transaction");
        } else {
            debug!(driver = %self.kind, connection = %guard.name(), step = ?step, depth, "Nested transaction level");
        }
        Ok(())
    }

    pub async fn set_logging(&self, enabled: bool) {
        self.log.lock().await.set_enabled(enabled);
    }

    pub async fn is_logging(&self) -> bool {
        self.log.lock().await.is_enabled()
    }

    pub async fn set_query_log_capacity(&self, capacity: usize) {
        self.log.lock().await.set_capacity(capacity);
    }

    pub async fn query_log(&self, limit: Option<usize>) -> Vec<QueryLogEntry> {
        self.log.lock().await.recent(limit)
    }

    pub async fn clear_query_log(&self) {
        self.log.lock().await.clear();
    }
}
