//! Database dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that generate backend-specific match
//! arms over [`DbConnection`](crate::db::DbConnection) while keeping call sites
//! linear and readable.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for `DbConnection` variants, reducing the
/// need to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     MySql(c) => mysql::run(c, sql).await,
///     SQLite(c) => sqlite::run(c, sql).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::connection::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
