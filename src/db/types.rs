//! Row decoding into JSON values.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite columns are classified by the storage class of each value rather than
//! the declared column type, since expression columns carry no declaration.

use crate::models::{DatabaseType, Row as JsonRow};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower == "null" {
        return TypeCategory::Null;
    }

    if lower == "text" || lower.contains("char") {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Wrapper type for raw DECIMAL values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Encode binary column data as a base64 JSON string.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Trait for converting database rows to JSON maps.
///
/// SQL NULL becomes `null`; a value that cannot be decoded is an error.
pub trait RowToJson {
    fn to_json_map(&self) -> Result<JsonRow, sqlx::Error>;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Result<JsonRow, sqlx::Error> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                let value = mysql::decode_column(self, idx, type_name, category)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Result<JsonRow, sqlx::Error> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, declared)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Result<JsonValue, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(JsonValue::Null);
        }

        match category {
            TypeCategory::Decimal => Ok(JsonValue::String(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(JsonValue::Bool(row.try_get::<bool, _>(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(encode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Json => row.try_get::<JsonValue, _>(idx),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        // Signed types first; UNSIGNED columns only decode as u64
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(JsonValue::Number(v.into()));
        }
        let v = row.try_get::<u64, _>(idx)?;
        Ok(JsonValue::Number(v.into()))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(float_value(v));
        }
        let v = row.try_get::<f32, _>(idx)?;
        Ok(float_value(v as f64))
    }

    fn decode_text(row: &MySqlRow, idx: usize, type_name: &str) -> Result<JsonValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Ok(JsonValue::String(v));
        }
        // Temporal columns decode through chrono, not String
        if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
            return Ok(JsonValue::String(v.format("%Y-%m-%d %H:%M:%S").to_string()));
        }
        if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
            return Ok(JsonValue::String(v.to_string()));
        }
        if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(idx) {
            return Ok(JsonValue::String(v.to_string()));
        }
        tracing::debug!(column = idx, type_name, "Decoding unknown column type as binary");
        Ok(encode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        declared: TypeCategory,
    ) -> Result<JsonValue, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        let storage = categorize_type(raw.type_info().name(), DatabaseType::SQLite);

        let value = match (declared, storage) {
            (TypeCategory::Boolean, TypeCategory::Integer) => {
                JsonValue::Bool(row.try_get::<bool, _>(idx)?)
            }
            (_, TypeCategory::Integer) => JsonValue::Number(row.try_get::<i64, _>(idx)?.into()),
            (_, TypeCategory::Float) => float_value(row.try_get::<f64, _>(idx)?),
            (_, TypeCategory::Binary) => encode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?),
            (TypeCategory::Json, _) => {
                let text = row.try_get::<String, _>(idx)?;
                // Text that is not valid JSON is returned as stored
                serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
            }
            _ => JsonValue::String(row.try_get::<String, _>(idx)?),
        };
        Ok(value)
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT UNSIGNED", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_text_and_null() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(categorize_type("NULL", DatabaseType::SQLite), TypeCategory::Null);
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_encode_binary_value() {
        assert_eq!(
            encode_binary_value(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(encode_binary_value(&[]), JsonValue::String(String::new()));
    }
}
