//! Named connection slots.
//!
//! Each slot owns at most one live [`DbConnection`], created lazily on first
//! acquisition and verified with a liveness probe on later ones. A failed probe
//! discards the handle and connects again once.
//!
//! Slots are individually locked: a [`ConnectionGuard`] keeps its slot for the
//! duration of one driver operation, which also serializes the transaction
//! statements issued on that handle.

use crate::audit::{FaultEvent, FaultSink};
use crate::config::{ConnectionOptions, Environment};
use crate::db::connection::DbConnection;
use crate::db::transaction::TransactionCoordinator;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Slot {
    config: ConnectionConfig,
    handle: Option<DbConnection>,
    last_verified: Option<Instant>,
    transaction: TransactionCoordinator,
    #[cfg(test)]
    fail_next_probe: bool,
}

impl Slot {
    fn shared(config: ConnectionConfig) -> Arc<Mutex<Slot>> {
        Arc::new(Mutex::new(Slot {
            config,
            handle: None,
            last_verified: None,
            transaction: TransactionCoordinator::new(),
            #[cfg(test)]
            fail_next_probe: false,
        }))
    }

    /// Drop the handle and forget any open transaction levels.
    fn discard_handle(&mut self, name: &str) -> Option<DbConnection> {
        let depth = self.transaction.reset();
        if depth > 0 {
            warn!(
                connection = %name,
                depth = depth,
                "Discarding handle with an open transaction; its work is lost"
            );
        }
        self.last_verified = None;
        self.handle.take()
    }
}

/// Registry of named connection slots.
pub struct ConnectionRegistry {
    slots: RwLock<HashMap<String, Arc<Mutex<Slot>>>>,
    env: Environment,
    faults: Arc<dyn FaultSink>,
    probe_interval: Duration,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("env", &self.env)
            .field("probe_interval", &self.probe_interval)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new(env: Environment, faults: Arc<dyn FaultSink>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            env,
            faults,
            probe_interval: Duration::ZERO,
        }
    }

    /// Skip the liveness probe for handles verified less than `interval` ago.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Store the resolved configuration for `name` without connecting.
    ///
    /// Re-registering replaces the configuration as long as the slot has no
    /// live handle yet.
    pub async fn register(&self, name: &str, options: &ConnectionOptions) -> DbResult<()> {
        let config = ConnectionConfig::resolve(options, &self.env)?;
        debug!(connection = %name, config = ?config, "Registering connection");

        let existing = {
            let mut slots = self.slots.write().await;
            match slots.get(name) {
                Some(slot) => Arc::clone(slot),
                None => {
                    slots.insert(name.to_string(), Slot::shared(config));
                    info!(connection = %name, "Connection registered");
                    return Ok(());
                }
            }
        }; // Map lock released here

        let mut slot = existing.lock().await;
        if slot.handle.is_some() {
            return Err(DbError::configuration(format!(
                "Connection '{}' is already open; disconnect it before registering new settings",
                name
            )));
        }
        slot.config = config;
        info!(connection = %name, "Connection settings replaced");
        Ok(())
    }

    /// Lock the slot for `name`, connecting or reconnecting as needed.
    ///
    /// Names that were never registered are configured from the environment.
    pub async fn acquire(&self, name: &str) -> DbResult<ConnectionGuard> {
        let slot = self.slot(name).await?;
        let mut slot = slot.lock_owned().await;
        self.ensure_live(name, &mut slot).await?;
        Ok(ConnectionGuard {
            name: name.to_string(),
            slot,
        })
    }

    /// Resolved configuration of a known slot.
    pub async fn config(&self, name: &str) -> Option<ConnectionConfig> {
        let slot = self.existing_slot(name).await?;
        let slot = slot.lock().await;
        Some(slot.config.clone())
    }

    /// Whether the slot currently holds a handle (not probed).
    pub async fn is_connected(&self, name: &str) -> bool {
        match self.existing_slot(name).await {
            Some(slot) => slot.lock().await.handle.is_some(),
            None => false,
        }
    }

    /// Transaction depth of the slot; 0 for unknown names.
    pub async fn transaction_depth(&self, name: &str) -> u32 {
        match self.existing_slot(name).await {
            Some(slot) => slot.lock().await.transaction.depth(),
            None => 0,
        }
    }

    /// Names of all known slots, sorted.
    pub async fn connection_names(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut names: Vec<String> = slots.keys().cloned().collect();
        names.sort();
        names
    }

    /// Close the handle of `name`, keeping its configuration.
    ///
    /// Returns whether a handle was open.
    pub async fn disconnect(&self, name: &str) -> bool {
        let Some(slot) = self.existing_slot(name).await else {
            return false;
        };
        let mut slot = slot.lock().await;
        match slot.discard_handle(name) {
            Some(handle) => {
                close_handle(name, handle).await;
                true
            }
            None => false,
        }
    }

    /// Close every open handle.
    pub async fn close_all(&self) {
        let slots: Vec<(String, Arc<Mutex<Slot>>)> = {
            let slots = self.slots.read().await;
            slots
                .iter()
                .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
                .collect()
        };

        for (name, slot) in slots {
            let mut slot = slot.lock().await;
            if let Some(handle) = slot.discard_handle(&name) {
                close_handle(&name, handle).await;
            }
        }
        info!("All connections closed");
    }

    async fn existing_slot(&self, name: &str) -> Option<Arc<Mutex<Slot>>> {
        let slots = self.slots.read().await;
        slots.get(name).map(Arc::clone)
    }

    async fn slot(&self, name: &str) -> DbResult<Arc<Mutex<Slot>>> {
        if let Some(slot) = self.existing_slot(name).await {
            return Ok(slot);
        }

        let config = ConnectionConfig::resolve(&ConnectionOptions::default(), &self.env)?;
        let mut slots = self.slots.write().await;
        let slot = slots.entry(name.to_string()).or_insert_with(|| {
            debug!(connection = %name, "Configuring unregistered connection from environment");
            Slot::shared(config)
        });
        Ok(Arc::clone(slot))
    }

    async fn ensure_live(&self, name: &str, slot: &mut Slot) -> DbResult<()> {
        if let Some(handle) = slot.handle.as_mut() {
            let recently_verified = slot
                .last_verified
                .is_some_and(|at| at.elapsed() < self.probe_interval);
            if recently_verified {
                return Ok(());
            }

            let probe = handle.ping().await;
            #[cfg(test)]
            let probe = if std::mem::take(&mut slot.fail_next_probe) {
                Err(sqlx::Error::WorkerCrashed)
            } else {
                probe
            };
            match probe {
                Ok(()) => {
                    slot.last_verified = Some(Instant::now());
                    return Ok(());
                }
                Err(e) => {
                    warn!(connection = %name, error = %e, "Liveness probe failed, reconnecting");
                    slot.discard_handle(name);
                }
            }
        }

        match DbConnection::connect(name, &slot.config).await {
            Ok(handle) => {
                info!(
                    connection = %name,
                    db_type = %handle.db_type(),
                    target = %slot.config.masked_url(),
                    "Connected"
                );
                slot.handle = Some(handle);
                slot.last_verified = Some(Instant::now());
                Ok(())
            }
            Err(err) => {
                if matches!(err, DbError::Connection { .. }) {
                    self.faults
                        .record(FaultEvent::connection_failure(name, err.to_string()));
                }
                Err(err)
            }
        }
    }
}

async fn close_handle(name: &str, handle: DbConnection) {
    match handle.close().await {
        Ok(()) => info!(connection = %name, "Connection closed"),
        Err(e) => warn!(connection = %name, error = %e, "Error while closing connection"),
    }
}

/// Exclusive access to one slot for the duration of a driver operation.
pub struct ConnectionGuard {
    name: String,
    slot: OwnedMutexGuard<Slot>,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("name", &self.name)
            .field("depth", &self.slot.transaction.depth())
            .finish_non_exhaustive()
    }
}

impl ConnectionGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.slot.config
    }

    pub fn db_type(&self) -> DatabaseType {
        self.slot.config.db_type
    }

    pub fn transaction(&self) -> &TransactionCoordinator {
        &self.slot.transaction
    }

    /// The live handle.
    pub fn connection(&mut self) -> DbResult<&mut DbConnection> {
        Ok(self.parts()?.0)
    }

    /// The live handle together with the slot's transaction state.
    pub fn parts(&mut self) -> DbResult<(&mut DbConnection, &mut TransactionCoordinator)> {
        let slot = &mut *self.slot;
        match slot.handle.as_mut() {
            Some(handle) => Ok((handle, &mut slot.transaction)),
            None => Err(DbError::connection(
                self.name.clone(),
                "No live handle",
                "Acquire the connection again",
            )),
        }
    }

    /// Force a liveness probe on the next acquisition, e.g. after a transport error.
    pub fn mark_suspect(&mut self) {
        self.slot.last_verified = None;
    }
}
