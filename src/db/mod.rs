//! Database access layer.
//!
//! This module provides the building blocks both drivers run on:
//! - Live connection handles and the named connection registry
//! - Statement execution and parameter binding
//! - Row decoding into JSON values
//! - Nested transaction bookkeeping
//! - The statement log and shared CRUD SQL builders
//! - Database dispatch macros for reducing code duplication

pub mod connection;
pub mod crud;
pub mod executor;
#[macro_use]
pub mod macros;
pub mod params;
pub mod query_log;
pub mod registry;
pub mod transaction;
pub mod types;

pub use connection::DbConnection;
pub use executor::StatementCache;
pub use params::TypeCode;
pub use query_log::QueryLog;
pub use registry::{ConnectionGuard, ConnectionRegistry};
pub use transaction::{TransactionCoordinator, TransactionStep};
