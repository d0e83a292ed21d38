//! Entry point for calling code.
//!
//! A [`Database`] owns one instance of each driver and initializes them on
//! demand: the prepared driver on first use, the legacy driver only when
//! [`Database::init_legacy`] is called. Each context owns its own drivers and
//! connections; nothing is shared globally.

use crate::audit::{FaultSink, TracingFaultSink};
use crate::config::{ConfigSource, DEFAULT_CONNECTION, Environment, Settings};
use crate::db::registry::ConnectionRegistry;
use crate::driver::{DEFAULT_DRIVER, Driver, DriverKind, LegacyDriver, PreparedDriver};
use crate::error::{DbError, DbResult};
use crate::models::QueryLogEntry;
use crate::query_builder::QueryBuilder;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

pub struct Database {
    source: Arc<dyn ConfigSource>,
    prepared: PreparedDriver,
    legacy: LegacyDriver,
    prepared_ready: OnceCell<()>,
    legacy_ready: OnceCell<()>,
    /// Set by `set_query_logging`; takes precedence over the config source.
    logging_override: RwLock<Option<bool>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("prepared", &self.prepared)
            .field("legacy", &self.legacy)
            .field("prepared_ready", &self.prepared_ready.initialized())
            .field("legacy_ready", &self.legacy_ready.initialized())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Create an uninitialized context.
    ///
    /// `env` supplies fallback settings for every connection; `faults` receives
    /// connection failures from both drivers.
    pub fn new(source: Arc<dyn ConfigSource>, env: Environment, faults: Arc<dyn FaultSink>) -> Self {
        let sequence = Arc::new(AtomicU64::new(0));
        let prepared = PreparedDriver::new(ConnectionRegistry::new(env.clone(), Arc::clone(&faults)))
            .with_log_sequence(Arc::clone(&sequence));
        let legacy =
            LegacyDriver::new(ConnectionRegistry::new(env, faults)).with_log_sequence(sequence);
        Self {
            source,
            prepared,
            legacy,
            prepared_ready: OnceCell::new(),
            legacy_ready: OnceCell::new(),
            logging_override: RwLock::new(None),
        }
    }

    /// Context reading the process environment and reporting faults through tracing.
    pub fn from_settings(settings: Settings) -> Self {
        Self::new(
            Arc::new(settings),
            Environment::Process,
            Arc::new(TracingFaultSink),
        )
    }

    /// Register the default connection for the prepared driver and apply the
    /// query log settings. Later calls do nothing.
    pub async fn init(&self) -> DbResult<()> {
        self.prepared_ready
            .get_or_try_init(|| async {
                let options = self.source.load()?;
                self.prepared.register(DEFAULT_CONNECTION, &options).await?;

                let log = self.source.query_log();
                let logging = self.logging_override.read().await;
                self.prepared.set_query_log_capacity(log.capacity).await;
                self.prepared
                    .set_logging(logging.unwrap_or(log.enabled))
                    .await;

                info!(driver = %DriverKind::Prepared, "Database initialized");
                Ok::<(), DbError>(())
            })
            .await?;
        Ok(())
    }

    /// Provision the legacy driver with the default connection. Later calls do nothing.
    pub async fn init_legacy(&self) -> DbResult<()> {
        self.legacy_ready
            .get_or_try_init(|| async {
                let options = self.source.load()?;
                self.legacy.provision(DEFAULT_CONNECTION, &options).await?;

                let log = self.source.query_log();
                let logging = self.logging_override.read().await;
                self.legacy.set_query_log_capacity(log.capacity).await;
                self.legacy.set_logging(logging.unwrap_or(log.enabled)).await;

                info!(driver = %DriverKind::Legacy, "Database initialized");
                Ok::<(), DbError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.prepared_ready.initialized()
    }

    /// The prepared driver, initializing the context on first use.
    pub async fn prepared(&self) -> DbResult<&PreparedDriver> {
        self.init().await?;
        Ok(&self.prepared)
    }

    /// The legacy driver; fails unless [`Database::init_legacy`] has run.
    pub fn legacy(&self) -> DbResult<&LegacyDriver> {
        if self.legacy_ready.initialized() {
            Ok(&self.legacy)
        } else {
            Err(DbError::initialization(DriverKind::Legacy.name()))
        }
    }

    /// Either driver behind the common interface.
    pub async fn driver(&self, kind: DriverKind) -> DbResult<&dyn Driver> {
        match kind {
            DriverKind::Prepared => Ok(self.prepared().await?),
            DriverKind::Legacy => Ok(self.legacy()?),
        }
    }

    pub fn default_driver(&self) -> DriverKind {
        DEFAULT_DRIVER
    }

    /// Query builder for `table` on the default connection of the prepared driver.
    pub async fn table(&self, table: &str) -> DbResult<QueryBuilder<'_>> {
        Ok(self.prepared().await?.default_table(table))
    }

    /// Turn statement logging on or off for both drivers.
    ///
    /// The choice also holds for drivers initialized later.
    pub async fn set_query_logging(&self, enabled: bool) {
        let mut logging = self.logging_override.write().await;
        *logging = Some(enabled);
        self.prepared.set_logging(enabled).await;
        self.legacy.set_logging(enabled).await;
    }

    pub async fn is_query_logging(&self) -> bool {
        self.prepared.is_logging().await
    }

    /// The most recent `limit` statements of both drivers, in execution order.
    pub async fn query_log(&self, limit: Option<usize>) -> Vec<QueryLogEntry> {
        let mut entries = self.prepared.query_log(None).await;
        entries.extend(self.legacy.query_log(None).await);
        entries.sort_by_key(|entry| entry.sequence);

        let keep = limit.unwrap_or(entries.len()).min(entries.len());
        entries.split_off(entries.len() - keep)
    }

    /// Close every open connection of both drivers.
    pub async fn close(&self) {
        self.prepared.close().await;
        self.legacy.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryFaultSink;
    use crate::config::ConnectionOptions;

    fn database() -> Database {
        Database::new(
            Arc::new(ConnectionOptions::sqlite(":memory:")),
            Environment::empty(),
            Arc::new(MemoryFaultSink::new()),
        )
    }

    #[tokio::test]
    async fn test_prepared_initializes_on_first_use() {
        let db = database();
        assert!(!db.is_initialized());
        db.prepared().await.unwrap();
        assert!(db.is_initialized());
        db.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_legacy_requires_explicit_init() {
        let db = database();
        db.init().await.unwrap();
        assert!(matches!(db.legacy(), Err(DbError::Initialization { .. })));
        assert!(db.driver(DriverKind::Legacy).await.is_err());

        db.init_legacy().await.unwrap();
        db.init_legacy().await.unwrap();
        assert_eq!(
            db.driver(DriverKind::Legacy).await.unwrap().kind(),
            DriverKind::Legacy
        );
    }

    #[tokio::test]
    async fn test_init_failure_can_be_retried() {
        let db = Database::new(
            Arc::new(ConnectionOptions::default()),
            Environment::empty(),
            Arc::new(MemoryFaultSink::new()),
        );
        assert!(matches!(
            db.init().await,
            Err(DbError::Configuration { .. })
        ));
        assert!(!db.is_initialized());
    }

    #[test]
    fn test_default_driver() {
        assert_eq!(database().default_driver(), DriverKind::Prepared);
    }

    #[tokio::test]
    async fn test_logging_choice_survives_lazy_init() {
        let db = database();
        db.set_query_logging(true).await;

        let prepared = db.prepared().await.unwrap();
        assert!(prepared.is_logging().await);
        prepared.execute("SELECT 1", &[], DEFAULT_CONNECTION).await.unwrap();
        assert_eq!(db.query_log(None).await.len(), 1);

        db.init_legacy().await.unwrap();
        assert!(db.legacy().unwrap().is_logging().await);
    }
}
