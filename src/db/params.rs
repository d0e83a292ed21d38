//! Parameter binding utilities for database queries.
//!
//! This module binds `QueryParam` values to database-specific query objects and
//! implements the type-code binding used by the legacy driver: one code per
//! bound value, `i` integer, `d` double, `s` string, `b` blob.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use sqlx::mysql::MySqlArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Sqlite};
use std::fmt;

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Declared type of one bound value in a legacy type-code string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Integer,
    Double,
    String,
    Blob,
}

impl TypeCode {
    pub fn from_char(code: char) -> Option<Self> {
        match code {
            'i' => Some(Self::Integer),
            'd' => Some(Self::Double),
            's' => Some(Self::String),
            'b' => Some(Self::Blob),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Integer => 'i',
            Self::Double => 'd',
            Self::String => 's',
            Self::Blob => 'b',
        }
    }

    /// Code matching a value's runtime type.
    pub fn infer(param: &QueryParam) -> Self {
        match param {
            QueryParam::Int(_) | QueryParam::Bool(_) => Self::Integer,
            QueryParam::Float(_) => Self::Double,
            QueryParam::Bytes(_) => Self::Blob,
            QueryParam::String(_) | QueryParam::Null => Self::String,
        }
    }

    /// Convert a value to this declared type. NULL stays NULL.
    pub fn coerce(self, param: &QueryParam) -> DbResult<QueryParam> {
        let coerced = match (self, param) {
            (_, QueryParam::Null) => Some(QueryParam::Null),

            (Self::Integer, QueryParam::Int(v)) => Some(QueryParam::Int(*v)),
            (Self::Integer, QueryParam::Bool(v)) => Some(QueryParam::Int(i64::from(*v))),
            (Self::Integer, QueryParam::Float(v)) if v.fract() == 0.0 && v.is_finite() => {
                Some(QueryParam::Int(*v as i64))
            }
            (Self::Integer, QueryParam::String(s)) => {
                s.trim().parse::<i64>().ok().map(QueryParam::Int)
            }

            (Self::Double, QueryParam::Float(v)) => Some(QueryParam::Float(*v)),
            (Self::Double, QueryParam::Int(v)) => Some(QueryParam::Float(*v as f64)),
            (Self::Double, QueryParam::Bool(v)) => {
                Some(QueryParam::Float(if *v { 1.0 } else { 0.0 }))
            }
            (Self::Double, QueryParam::String(s)) => {
                s.trim().parse::<f64>().ok().map(QueryParam::Float)
            }

            (Self::String, QueryParam::String(s)) => Some(QueryParam::String(s.clone())),
            (Self::String, QueryParam::Int(v)) => Some(QueryParam::String(v.to_string())),
            (Self::String, QueryParam::Float(v)) => Some(QueryParam::String(v.to_string())),
            (Self::String, QueryParam::Bool(v)) => {
                Some(QueryParam::String(if *v { "1" } else { "0" }.to_string()))
            }
            (Self::String, QueryParam::Bytes(b)) => String::from_utf8(b.clone())
                .ok()
                .map(QueryParam::String),

            (Self::Blob, QueryParam::Bytes(b)) => Some(QueryParam::Bytes(b.clone())),
            (Self::Blob, QueryParam::String(s)) => Some(QueryParam::Bytes(s.as_bytes().to_vec())),

            _ => None,
        };

        coerced.ok_or_else(|| {
            DbError::invalid_input(format!(
                "Cannot bind {} value as type '{}'",
                param.type_name(),
                self.as_char()
            ))
        })
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parse a type-code string such as `"isd"`.
pub fn parse_type_codes(codes: &str) -> DbResult<Vec<TypeCode>> {
    codes
        .chars()
        .map(|c| {
            TypeCode::from_char(c).ok_or_else(|| {
                DbError::invalid_input(format!(
                    "Unknown type code '{c}' (expected one of i, d, s, b)"
                ))
            })
        })
        .collect()
}

/// Build the type-code string matching each value's runtime type.
pub fn infer_type_codes(params: &[QueryParam]) -> String {
    params.iter().map(|p| TypeCode::infer(p).as_char()).collect()
}

/// Coerce `params` to the declared `codes`, one code per value.
pub fn apply_type_codes(codes: &str, params: &[QueryParam]) -> DbResult<Vec<QueryParam>> {
    let codes = parse_type_codes(codes)?;
    if codes.len() != params.len() {
        return Err(DbError::invalid_input(format!(
            "Type code count ({}) does not match parameter count ({})",
            codes.len(),
            params.len()
        )));
    }

    codes
        .iter()
        .zip(params)
        .map(|(code, param)| code.coerce(param))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_codes() {
        assert_eq!(
            parse_type_codes("idsb").unwrap(),
            vec![
                TypeCode::Integer,
                TypeCode::Double,
                TypeCode::String,
                TypeCode::Blob
            ]
        );
        assert!(parse_type_codes("").unwrap().is_empty());
        assert!(matches!(
            parse_type_codes("ix"),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_infer_type_codes() {
        let params = vec![
            QueryParam::Int(1),
            QueryParam::Bool(true),
            QueryParam::Float(1.5),
            QueryParam::String("a".into()),
            QueryParam::Null,
            QueryParam::Bytes(vec![1, 2]),
        ];
        assert_eq!(infer_type_codes(&params), "iidssb");
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(
            TypeCode::Integer.coerce(&QueryParam::String(" 42 ".into())).unwrap(),
            QueryParam::Int(42)
        );
        assert_eq!(
            TypeCode::Integer.coerce(&QueryParam::Bool(true)).unwrap(),
            QueryParam::Int(1)
        );
        assert_eq!(
            TypeCode::Integer.coerce(&QueryParam::Float(3.0)).unwrap(),
            QueryParam::Int(3)
        );
        assert!(TypeCode::Integer.coerce(&QueryParam::Float(3.5)).is_err());
        assert!(TypeCode::Integer.coerce(&QueryParam::String("abc".into())).is_err());
    }

    #[test]
    fn test_coerce_double_and_string() {
        assert_eq!(
            TypeCode::Double.coerce(&QueryParam::Int(2)).unwrap(),
            QueryParam::Float(2.0)
        );
        assert_eq!(
            TypeCode::String.coerce(&QueryParam::Int(7)).unwrap(),
            QueryParam::String("7".into())
        );
        assert_eq!(
            TypeCode::String.coerce(&QueryParam::Null).unwrap(),
            QueryParam::Null
        );
        assert!(TypeCode::String.coerce(&QueryParam::Bytes(vec![0xFF, 0xFE])).is_err());
    }

    #[test]
    fn test_coerce_blob() {
        assert_eq!(
            TypeCode::Blob.coerce(&QueryParam::String("ab".into())).unwrap(),
            QueryParam::Bytes(b"ab".to_vec())
        );
        assert!(TypeCode::Blob.coerce(&QueryParam::Int(1)).is_err());
    }

    #[test]
    fn test_apply_type_codes_length_mismatch() {
        let err = apply_type_codes("ii", &[QueryParam::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_apply_type_codes() {
        let bound = apply_type_codes(
            "is",
            &[QueryParam::String("5".into()), QueryParam::Int(9)],
        )
        .unwrap();
        assert_eq!(
            bound,
            vec![QueryParam::Int(5), QueryParam::String("9".into())]
        );
    }
}
