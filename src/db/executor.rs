//! Statement execution engine.
//!
//! Runs one SQL statement on a live connection and collects every result row
//! together with the affected-row count and generated id.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific execution
//! - `sqlite`: SQLite-specific execution
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::connection::DbConnection;
use crate::db::types::RowToJson;
use crate::impl_db_dispatch;
use crate::models::{QueryParam, StatementResult};
use futures_util::TryStreamExt;
use sqlx::{Either, Executor};

/// How a parameterized statement is prepared on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementCache {
    /// Prepared once per connection and reused.
    Cached,
    /// Prepared for a single execution and released afterwards.
    Uncached,
}

impl StatementCache {
    fn persistent(self) -> bool {
        self == StatementCache::Cached
    }
}

/// Execute `sql` with positional `params` on `conn`.
pub async fn run(
    conn: &mut DbConnection,
    sql: &str,
    params: &[QueryParam],
    cache: StatementCache,
) -> Result<StatementResult, sqlx::Error> {
    impl_db_dispatch!(conn, {
        MySql(c) => mysql::run(c, sql, params, cache.persistent()).await,
        SQLite(c) => sqlite::run(c, sql, params, cache.persistent()).await,
    })
}

// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::MySql;
    use sqlx::mysql::MySqlConnection;

    pub async fn run(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
        persistent: bool,
    ) -> Result<StatementResult, sqlx::Error> {
        // When params is empty, use the text protocol: transaction control
        // statements are not supported as prepared statements
        let mut stream = if params.is_empty() {
            (&mut *conn).fetch_many(sql)
        } else {
            let mut query = sqlx::query::<MySql>(sql).persistent(persistent);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            (&mut *conn).fetch_many(query)
        };

        let mut result = StatementResult::default();
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => {
                    result.rows_affected += done.rows_affected();
                    if done.last_insert_id() > 0 {
                        result.last_insert_id = Some(done.last_insert_id());
                    }
                }
                Either::Right(row) => result.rows.push(row.to_json_map()?),
            }
        }
        Ok(result)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::Sqlite;
    use sqlx::sqlite::SqliteConnection;

    pub async fn run(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
        persistent: bool,
    ) -> Result<StatementResult, sqlx::Error> {
        let mut stream = if params.is_empty() {
            (&mut *conn).fetch_many(sql)
        } else {
            let mut query = sqlx::query::<Sqlite>(sql).persistent(persistent);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            (&mut *conn).fetch_many(query)
        };

        let mut result = StatementResult::default();
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => {
                    result.rows_affected += done.rows_affected();
                    // SQLite reports the connection's last rowid on every statement
                    let rowid = done.last_insert_rowid();
                    if done.rows_affected() > 0 && rowid > 0 {
                        result.last_insert_id = Some(rowid as u64);
                    }
                }
                Either::Right(row) => result.rows.push(row.to_json_map()?),
            }
        }
        Ok(result)
    }
}
