//! Shared helpers for the integration tests.

#![allow(dead_code)]

use db_layer::config::{ConnectionOptions, Environment};
use db_layer::{ConnectionRegistry, Driver, LegacyDriver, MemoryFaultSink, PreparedDriver};
use std::sync::Arc;
use tempfile::TempDir;

/// A SQLite database file inside a fresh temporary directory.
pub struct TempDatabase {
    _dir: TempDir,
    pub path: String,
}

impl TempDatabase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("test.db").to_string_lossy().into_owned();
        Self { _dir: dir, path }
    }

    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions::sqlite(self.path.clone())
    }

    /// Environment resolving every unregistered connection name to this file.
    pub fn env(&self) -> Environment {
        Environment::fixed([("DB_DRIVER", "sqlite"), ("DB_DATABASE", self.path.as_str())])
    }
}

/// Environment resolving every unregistered name to a private in-memory database.
pub fn memory_env() -> Environment {
    Environment::fixed([("DB_DRIVER", "sqlite"), ("DB_DATABASE", ":memory:")])
}

pub fn prepared_driver(env: Environment) -> PreparedDriver {
    PreparedDriver::new(ConnectionRegistry::new(env, Arc::new(MemoryFaultSink::new())))
}

pub fn legacy_driver(env: Environment) -> LegacyDriver {
    LegacyDriver::new(ConnectionRegistry::new(env, Arc::new(MemoryFaultSink::new())))
}

pub async fn create_items_table(driver: &dyn Driver, connection: &str) {
    driver
        .execute(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price REAL,
                active BOOLEAN,
                note TEXT,
                payload BLOB
            )",
            &[],
            connection,
        )
        .await
        .expect("create items table");
}

pub async fn count_items(driver: &dyn Driver, connection: &str) -> i64 {
    driver
        .query_value("SELECT COUNT(*) FROM items", &[], connection)
        .await
        .expect("count items")
        .and_then(|v| v.as_i64())
        .expect("numeric count")
}
