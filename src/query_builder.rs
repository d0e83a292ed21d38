//! Fluent SELECT builder.
//!
//! A builder collects a projection, WHERE fragments with their parameters, one
//! sort key and LIMIT/OFFSET, then compiles them to a parameterized statement.
//! Identifiers are emitted as given; values are always bound.
//!
//! ```ignore
//! let rows = driver
//!     .table("users", "default")
//!     .select(["id", "name"])
//!     .and_where("age", ">=", 18)
//!     .where_in("role", ["admin", "editor"])
//!     .order_by("name", SortDirection::Asc)
//!     .limit(20)
//!     .get()
//!     .await?;
//! ```

use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Row};
use serde_json::Value as JsonValue;

/// Row count emitted when OFFSET is used without LIMIT.
const UNBOUNDED_LIMIT: i64 = i64::MAX;

/// Sort direction for [`QueryBuilder::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WhereClause {
    sql: String,
    params: Vec<QueryParam>,
}

/// Builder for a SELECT on one table, executed through the driver it came from.
#[derive(Clone)]
#[must_use = "a query builder does nothing until get(), first() or count() is awaited"]
pub struct QueryBuilder<'d> {
    driver: &'d dyn Driver,
    connection: String,
    table: String,
    columns: Vec<String>,
    wheres: Vec<WhereClause>,
    order: Option<(String, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl std::fmt::Debug for QueryBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("driver", &self.driver.kind())
            .field("connection", &self.connection)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("wheres", &self.wheres)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'d> QueryBuilder<'d> {
    pub fn new(driver: &'d dyn Driver, table: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            driver,
            connection: connection.into(),
            table: table.into(),
            columns: Vec::new(),
            wheres: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    /// Replace the projection. An empty list selects `*`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add `column op ?`, joined to earlier conditions with AND.
    ///
    /// The operator is emitted verbatim.
    pub fn and_where(
        mut self,
        column: impl AsRef<str>,
        operator: impl AsRef<str>,
        value: impl Into<QueryParam>,
    ) -> Self {
        self.wheres.push(WhereClause {
            sql: format!("{} {} ?", column.as_ref(), operator.as_ref()),
            params: vec![value.into()],
        });
        self
    }

    /// Add `column IN (?, ...)` with one placeholder per value.
    ///
    /// An empty list matches no rows.
    pub fn where_in<I, V>(mut self, column: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryParam>,
    {
        let params: Vec<QueryParam> = values.into_iter().map(Into::into).collect();
        let sql = if params.is_empty() {
            "1 = 0".to_string()
        } else {
            let placeholders = vec!["?"; params.len()].join(", ");
            format!("{} IN ({})", column.as_ref(), placeholders)
        };
        self.wheres.push(WhereClause { sql, params });
        self
    }

    /// Sort by a single column; a later call replaces the earlier key.
    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    pub fn order_by_asc(self, column: impl Into<String>) -> Self {
        self.order_by(column, SortDirection::Asc)
    }

    /// Maximum number of rows. Negative values fail when the query runs.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rows to skip. Negative values fail when the query runs.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Compile the SELECT without running it.
    pub fn to_sql(&self) -> DbResult<(String, Vec<QueryParam>)> {
        self.validate()?;

        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", projection, self.table);
        let params = self.push_where(&mut sql);

        if let Some((column, direction)) = &self.order {
            sql.push_str(&format!(" ORDER BY {} {}", column, direction.as_sql()));
        }
        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(_)) => sql.push_str(&format!(" LIMIT {UNBOUNDED_LIMIT}")),
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok((sql, params))
    }

    /// Compile the COUNT query: WHERE is kept, projection, order and paging are
    /// not, so LIMIT and OFFSET are not checked either.
    pub fn to_count_sql(&self) -> DbResult<(String, Vec<QueryParam>)> {
        let mut sql = format!("SELECT COUNT(*) AS aggregate FROM {}", self.table);
        let params = self.push_where(&mut sql);
        Ok((sql, params))
    }

    /// Run the query and return every row.
    pub async fn get(self) -> DbResult<Vec<Row>> {
        let (sql, params) = self.to_sql()?;
        self.driver.query(&sql, &params, &self.connection).await
    }

    /// Run the query with LIMIT 1; `None` when nothing matches.
    pub async fn first(self) -> DbResult<Option<Row>> {
        let rows = self.limit(1).get().await?;
        Ok(rows.into_iter().next())
    }

    /// Count the rows matching the WHERE conditions.
    pub async fn count(self) -> DbResult<i64> {
        let (sql, params) = self.to_count_sql()?;
        let value = self
            .driver
            .query_value(&sql, &params, &self.connection)
            .await?;

        match value {
            Some(JsonValue::Number(n)) => n
                .as_i64()
                .ok_or_else(|| DbError::query(&sql, format!("Invalid row count: {n}"), None)),
            Some(JsonValue::String(s)) => s
                .parse::<i64>()
                .map_err(|_| DbError::query(&sql, format!("Invalid row count: {s}"), None)),
            other => Err(DbError::query(
                &sql,
                format!("COUNT returned no usable value: {other:?}"),
                None,
            )),
        }
    }

    fn validate(&self) -> DbResult<()> {
        if let Some(limit) = self.limit.filter(|l| *l < 0) {
            return Err(DbError::invalid_input(format!(
                "LIMIT must not be negative, got {limit}"
            )));
        }
        if let Some(offset) = self.offset.filter(|o| *o < 0) {
            return Err(DbError::invalid_input(format!(
                "OFFSET must not be negative, got {offset}"
            )));
        }
        Ok(())
    }

    fn push_where(&self, sql: &mut String) -> Vec<QueryParam> {
        if self.wheres.is_empty() {
            return Vec::new();
        }
        let fragments: Vec<&str> = self.wheres.iter().map(|w| w.sql.as_str()).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&fragments.join(" AND "));
        self.wheres
            .iter()
            .flat_map(|w| w.params.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryFaultSink;
    use crate::config::Environment;
    use crate::db::registry::ConnectionRegistry;
    use crate::driver::PreparedDriver;
    use std::sync::Arc;

    fn driver() -> PreparedDriver {
        PreparedDriver::new(ConnectionRegistry::new(
            Environment::empty(),
            Arc::new(MemoryFaultSink::new()),
        ))
    }

    #[test]
    fn test_default_projection() {
        let db = driver();
        let (sql, params) = db.table("users", "default").to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_full_select() {
        let db = driver();
        let (sql, params) = db
            .table("users", "default")
            .select(["id", "name"])
            .and_where("age", ">=", 18)
            .where_in("id", [1, 2, 3])
            .order_by("name", SortDirection::Desc)
            .limit(10)
            .offset(20)
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id, name FROM users WHERE age >= ? AND id IN (?, ?, ?) ORDER BY name DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            params,
            vec![
                QueryParam::Int(18),
                QueryParam::Int(1),
                QueryParam::Int(2),
                QueryParam::Int(3)
            ]
        );
    }

    #[test]
    fn test_empty_where_in_matches_nothing() {
        let db = driver();
        let (sql, params) = db
            .table("users", "default")
            .where_in("id", Vec::<i64>::new())
            .to_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE 1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_later_order_by_replaces_earlier() {
        let db = driver();
        let (sql, _) = db
            .table("users", "default")
            .order_by("name", SortDirection::Desc)
            .order_by_asc("id")
            .to_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users ORDER BY id ASC");
    }

    #[test]
    fn test_offset_without_limit() {
        let db = driver();
        let (sql, _) = db.table("users", "default").offset(5).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM users LIMIT 9223372036854775807 OFFSET 5");
    }

    #[test]
    fn test_negative_paging_is_rejected() {
        let db = driver();
        let err = db.table("users", "default").limit(-1).to_sql().unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        let err = db.table("users", "default").offset(-3).to_sql().unwrap_err();
        assert!(err.to_string().contains("OFFSET"));
    }

    #[test]
    fn test_count_sql_ignores_negative_paging() {
        let db = driver();
        let (sql, _) = db
            .table("users", "default")
            .limit(-1)
            .offset(-1)
            .to_count_sql()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS aggregate FROM users");
    }

    #[test]
    fn test_count_sql_ignores_projection_and_paging() {
        let db = driver();
        let (sql, params) = db
            .table("users", "default")
            .select(["name"])
            .and_where("active", "=", true)
            .order_by_asc("name")
            .limit(5)
            .to_count_sql()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS aggregate FROM users WHERE active = ?");
        assert_eq!(params, vec![QueryParam::Bool(true)]);
    }
}
