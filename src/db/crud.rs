//! SQL builders for the CRUD helpers shared by both drivers.
//!
//! Table and column names are trusted identifiers and are emitted as given.
//! Values are always bound as `?` placeholders.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;

/// A compiled statement: SQL text plus its positional parameters.
pub type CompiledStatement = (String, Vec<QueryParam>);

pub fn insert_sql(table: &str, fields: &[(&str, QueryParam)]) -> DbResult<CompiledStatement> {
    if fields.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Cannot insert into '{table}' without any fields"
        )));
    }

    let columns: Vec<&str> = fields.iter().map(|(column, _)| *column).collect();
    let placeholders = vec!["?"; fields.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    );
    Ok((sql, values(fields)))
}

pub fn update_sql(
    table: &str,
    data: &[(&str, QueryParam)],
    conditions: &[(&str, QueryParam)],
) -> DbResult<CompiledStatement> {
    if data.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Cannot update '{table}' without any fields"
        )));
    }
    require_conditions("update", table, conditions)?;

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments(data, ", "),
        assignments(conditions, " AND ")
    );
    let mut params = values(data);
    params.extend(values(conditions));
    Ok((sql, params))
}

pub fn delete_sql(table: &str, conditions: &[(&str, QueryParam)]) -> DbResult<CompiledStatement> {
    require_conditions("delete from", table, conditions)?;

    let sql = format!(
        "DELETE FROM {} WHERE {}",
        table,
        assignments(conditions, " AND ")
    );
    Ok((sql, values(conditions)))
}

fn require_conditions(
    operation: &str,
    table: &str,
    conditions: &[(&str, QueryParam)],
) -> DbResult<()> {
    if conditions.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Refusing to {operation} '{table}' without a WHERE condition"
        )));
    }
    Ok(())
}

fn assignments(fields: &[(&str, QueryParam)], separator: &str) -> String {
    fields
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(separator)
}

fn values(fields: &[(&str, QueryParam)]) -> Vec<QueryParam> {
    fields.iter().map(|(_, value)| value.clone()).collect()
}
