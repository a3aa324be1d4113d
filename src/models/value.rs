//! Column values and result rows.

use crate::error::{DbError, DbResult};
use crate::models::field::ColumnType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single column value, used both for statement arguments and row data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    Bool(bool),
    /// Stored as i64 for bigint range
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Convert this value into the representation a column of `column_type` stores.
    ///
    /// Drivers without a native boolean (SQLite, MySQL `tinyint(1)`) hand back
    /// integers for boolean columns, and integer literals are accepted for
    /// `real` columns.
    pub fn coerce_to(self, column_type: &ColumnType) -> DbResult<Value> {
        let value = match (column_type, self) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Boolean, Value::Bool(v)) => Value::Bool(v),
            (ColumnType::Boolean, Value::Int(v)) if v == 0 || v == 1 => Value::Bool(v == 1),
            (ColumnType::Bigint, Value::Int(v)) => Value::Int(v),
            (ColumnType::Real, Value::Float(v)) => Value::Float(v),
            (ColumnType::Real, Value::Int(v)) => Value::Float(v as f64),
            (ColumnType::Varchar(_) | ColumnType::Text, Value::Text(v)) => Value::Text(v),
            (column_type, other) => {
                return Err(DbError::invalid_input(format!(
                    "Cannot store {} value in {} column",
                    other.type_name(),
                    column_type.sql_type()
                )));
            }
        };
        Ok(value)
    }

    /// Parse command-line text into a value for a column of `column_type`.
    pub fn parse_as(raw: &str, column_type: &ColumnType) -> DbResult<Value> {
        let invalid = || {
            DbError::invalid_input(format!(
                "'{}' is not a valid {} value",
                raw,
                column_type.sql_type()
            ))
        };
        let value = match column_type {
            ColumnType::Boolean => Value::Bool(raw.parse().map_err(|_| invalid())?),
            ColumnType::Bigint => Value::Int(raw.parse().map_err(|_| invalid())?),
            ColumnType::Real => Value::Float(raw.parse().map_err(|_| invalid())?),
            ColumnType::Varchar(_) | ColumnType::Text => Value::Text(raw.to_string()),
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row: column names paired with values, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
