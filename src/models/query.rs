//! Query-related data models.
//!
//! This module defines bound parameter values, statement results and query log
//! entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// A decoded result row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Outcome of one executed statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatementResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    /// Auto-increment id generated by the statement, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<u64>,
}

impl StatementResult {
    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Consume the result, keeping the first row.
    pub fn into_first_row(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    /// Consume the result, keeping the first column of the first row.
    pub fn into_first_value(self) -> Option<JsonValue> {
        self.into_first_row()
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
    }
}

/// One recorded statement in the query log.
#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEntry {
    /// Position in execution order, shared by every log of one context.
    pub sequence: u64,
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub elapsed: Duration,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_query_param_conversions() {
        assert_eq!(QueryParam::from(5), QueryParam::Int(5));
        assert_eq!(QueryParam::from("a"), QueryParam::String("a".to_string()));
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null);
        assert_eq!(QueryParam::from(Some(2.5)), QueryParam::Float(2.5));
    }

    #[test]
    fn test_query_param_deserialize_untagged() {
        let params: Vec<QueryParam> = serde_json::from_value(json!([null, true, 7, 1.5, "x"])).unwrap();
        assert_eq!(
            params,
            vec![
                QueryParam::Null,
                QueryParam::Bool(true),
                QueryParam::Int(7),
                QueryParam::Float(1.5),
                QueryParam::String("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_statement_result_first_value() {
        let mut row = Row::new();
        row.insert("total".to_string(), json!(3));
        row.insert("other".to_string(), json!("x"));
        let result = StatementResult {
            rows: vec![row],
            ..StatementResult::default()
        };
        assert_eq!(result.into_first_value(), Some(json!(3)));
        assert_eq!(StatementResult::default().into_first_row(), None);
    }
}
