//! Driver implementations.
//!
//! Two drivers expose the same [`Driver`] surface over separate connection
//! registries:
//! - [`PreparedDriver`]: parameterized execution with cached prepared statements
//! - [`LegacyDriver`]: typed binding with explicit type codes, no statement
//!   cache, and explicit provisioning
//!
//! Both share the CRUD SQL builders and the row decoder, so identical inputs
//! produce identical rows.

mod engine;
pub mod legacy;
pub mod prepared;

pub use legacy::LegacyDriver;
pub use prepared::PreparedDriver;

use crate::db::crud;
use crate::error::DbResult;
use crate::models::{QueryParam, Row, StatementResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Driver implementations selectable through the facade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Prepared,
    Legacy,
}

/// Driver used when calling code does not choose one.
pub const DEFAULT_DRIVER: DriverKind = DriverKind::Prepared;

impl DriverKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Legacy => "legacy",
        }
    }
}

impl Default for DriverKind {
    fn default() -> Self {
        DEFAULT_DRIVER
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Common interface of both drivers.
///
/// Every operation names the connection it runs on. Table and column names in
/// the CRUD helpers are trusted identifiers; values are always bound.
#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Fails with an initialization error when the driver cannot run statements yet.
    fn check_initialized(&self) -> DbResult<()> {
        Ok(())
    }

    /// Execute one statement with positional parameters.
    async fn execute(
        &self,
        sql: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<StatementResult>;

    /// All rows produced by `sql`.
    async fn query(&self, sql: &str, params: &[QueryParam], connection: &str) -> DbResult<Vec<Row>> {
        Ok(self.execute(sql, params, connection).await?.rows)
    }

    /// First row, or `None` when nothing matches.
    async fn query_one(
        &self,
        sql: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<Option<Row>> {
        Ok(self.execute(sql, params, connection).await?.into_first_row())
    }

    /// First column of the first row, or `None` when nothing matches.
    async fn query_value(
        &self,
        sql: &str,
        params: &[QueryParam],
        connection: &str,
    ) -> DbResult<Option<JsonValue>> {
        Ok(self.execute(sql, params, connection).await?.into_first_value())
    }

    /// Insert one row and return the generated id (0 when the table has none).
    async fn insert(
        &self,
        table: &str,
        fields: &[(&str, QueryParam)],
        connection: &str,
    ) -> DbResult<u64> {
        self.check_initialized()?;
        let (sql, params) = crud::insert_sql(table, fields)?;
        let result = self.execute(&sql, &params, connection).await?;
        Ok(result.last_insert_id.unwrap_or(0))
    }

    /// Update rows matching every condition; returns the affected row count.
    async fn update(
        &self,
        table: &str,
        data: &[(&str, QueryParam)],
        conditions: &[(&str, QueryParam)],
        connection: &str,
    ) -> DbResult<u64> {
        self.check_initialized()?;
        let (sql, params) = crud::update_sql(table, data, conditions)?;
        Ok(self.execute(&sql, &params, connection).await?.rows_affected)
    }

    /// Delete rows matching every condition; returns the affected row count.
    async fn delete(
        &self,
        table: &str,
        conditions: &[(&str, QueryParam)],
        connection: &str,
    ) -> DbResult<u64> {
        self.check_initialized()?;
        let (sql, params) = crud::delete_sql(table, conditions)?;
        Ok(self.execute(&sql, &params, connection).await?.rows_affected)
    }

    /// Open a transaction, or a savepoint when one is already open.
    async fn begin(&self, connection: &str) -> DbResult<()>;

    /// Close the innermost level; only the outermost issues a real COMMIT.
    async fn commit(&self, connection: &str) -> DbResult<()>;

    /// Undo the innermost level.
    async fn rollback(&self, connection: &str) -> DbResult<()>;

    async fn transaction_depth(&self, connection: &str) -> DbResult<u32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_driver_is_prepared() {
        assert_eq!(DriverKind::default(), DriverKind::Prepared);
        assert_eq!(DEFAULT_DRIVER.to_string(), "prepared");
        assert_eq!(
            serde_json::to_string(&DriverKind::Legacy).unwrap(),
            "\"legacy\""
        );
    }
}
