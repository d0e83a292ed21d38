//! Dual-driver database access layer.
//!
//! This library provides named, lazily-connected database handles with
//! reconnection on failure, nested transactions emulated with savepoints, two
//! interchangeable drivers (prepared statements and legacy typed binding) and a
//! fluent query builder, for MySQL/MariaDB and SQLite.

pub mod audit;
pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod facade;
pub mod logging;
pub mod models;
pub mod query_builder;

pub use audit::{FaultEvent, FaultSink, MemoryFaultSink, TracingFaultSink};
pub use config::{ConfigSource, ConnectionOptions, Environment, Settings};
pub use db::ConnectionRegistry;
pub use driver::{DEFAULT_DRIVER, Driver, DriverKind, LegacyDriver, PreparedDriver};
pub use error::{DbError, DbResult};
pub use facade::Database;
pub use models::{ConnectionConfig, DatabaseType, QueryParam, Row, StatementResult};
pub use query_builder::{QueryBuilder, SortDirection};
