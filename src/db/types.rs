//! Driver row decoding.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract a [`Value`] for that category
//!
//! A value that cannot be decoded for its category is an error carrying the
//! driver's `sqlx::Error`; only SQL NULL decodes to [`Value::Null`].

use crate::error::DbResult;
use crate::models::{DatabaseType, Row, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Boolean before integers: MySQL reports tinyint(1) as BOOLEAN
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // varchar, text, char, date/time and anything unknown
    TypeCategory::Text
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw DECIMAL/NUMERIC text as sent by the server.
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

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Decimals become floats when they parse, text otherwise.
fn decimal_value(raw: RawDecimal) -> Value {
    raw.0
        .parse::<f64>()
        .map(Value::Float)
        .unwrap_or(Value::Text(raw.0))
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting driver rows into [`Row`]s.
///
/// A column that cannot be decoded for its category fails the whole row
/// with the driver's error. Only SQL NULL becomes [`Value::Null`].
pub trait RowToValues {
    fn to_row(&self) -> DbResult<Row>;
}

impl RowToValues for MySqlRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| -> DbResult<(String, Value)> {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                let value = mysql::decode_column(self, idx, category)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

impl RowToValues for PgRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| -> DbResult<(String, Value)> {
                let category =
                    categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                let value = postgres::decode_column(self, idx, category)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| -> DbResult<(String, Value)> {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, category)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

fn nullable<T>(value: Option<T>, to_value: impl FnOnce(T) -> Value) -> Value {
    value.map(to_value).unwrap_or(Value::Null)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================
//
// Integer and float decoders try each width the server may report for the
// category; the last attempt's error is returned when none fits.

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<RawDecimal>, _>(idx)?;
        Ok(nullable(v, decimal_value))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(nullable(v, Value::Int));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        let v = row.try_get::<Option<u64>, _>(idx)?;
        // bigint unsigned above i64::MAX has no Int representation
        Ok(nullable(v, |v| {
            i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(v.to_string()))
        }))
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<bool>, _>(idx)?;
        Ok(nullable(v, Value::Bool))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(nullable(v, Value::Float));
        }
        let v = row.try_get::<Option<f32>, _>(idx)?;
        Ok(nullable(v, |v| Value::Float(v.into())))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(nullable(v, Value::Text))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<RawDecimal>, _>(idx)?;
        Ok(nullable(v, decimal_value))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(nullable(v, Value::Int));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(nullable(v, |v| Value::Int(v.into())));
        }
        let v = row.try_get::<Option<i16>, _>(idx)?;
        Ok(nullable(v, |v| Value::Int(v.into())))
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<bool>, _>(idx)?;
        Ok(nullable(v, Value::Bool))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(nullable(v, Value::Float));
        }
        let v = row.try_get::<Option<f32>, _>(idx)?;
        Ok(nullable(v, |v| Value::Float(v.into())))
    }

    fn decode_text(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<String>, _>(idx)?;
        Ok(nullable(v, Value::Text))
    }
}

mod sqlite {
    use super::*;
    use sqlx::ValueRef;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<i64>, _>(idx)?;
        Ok(nullable(v, Value::Int))
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<bool>, _>(idx)?;
        Ok(nullable(v, Value::Bool))
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        let v = row.try_get::<Option<f64>, _>(idx)?;
        Ok(nullable(v, Value::Float))
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => Ok(nullable(v, Value::Text)),
            Err(err) => {
                // Columns without a declared type (e.g. expressions) are
                // decoded by the storage class of the value itself.
                let raw = row.try_get_raw(idx)?;
                match categorize_type(raw.type_info().name(), DatabaseType::SQLite) {
                    TypeCategory::Integer => decode_integer(row, idx),
                    TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
                    _ => Err(err),
                }
            }
        }
    }
}
