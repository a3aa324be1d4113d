//! Field descriptors: typed column metadata for one field of a shape.

use crate::error::{DbError, DbResult};
use crate::models::value::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default length for `varchar` columns.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 100;

/// SQL column type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Varchar(u32),
    Boolean,
    Bigint,
    Real,
    Text,
}

impl ColumnType {
    /// The DDL type string, e.g. `varchar(100)`.
    pub fn sql_type(&self) -> String {
        match self {
            Self::Varchar(len) => format!("varchar({})", len),
            Self::Boolean => "boolean".to_string(),
            Self::Bigint => "bigint".to_string(),
            Self::Real => "real".to_string(),
            Self::Text => "text".to_string(),
        }
    }

    /// Boolean and unbounded text columns are never keys.
    pub fn can_be_primary_key(&self) -> bool {
        !matches!(self, Self::Boolean | Self::Text)
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Varchar(_) => "StringField",
            Self::Boolean => "BooleanField",
            Self::Bigint => "IntegerField",
            Self::Real => "FloatField",
            Self::Text => "TextField",
        }
    }
}

impl FromStr for ColumnType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(len) = lower
            .strip_prefix("varchar(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let len = len
                .parse()
                .map_err(|_| DbError::invalid_input(format!("Invalid varchar length: {}", s)))?;
            return Ok(Self::Varchar(len));
        }

        match lower.as_str() {
            "string" | "varchar" => Ok(Self::Varchar(DEFAULT_VARCHAR_LENGTH)),
            "bool" | "boolean" => Ok(Self::Boolean),
            "int" | "integer" | "bigint" => Ok(Self::Bigint),
            "float" | "real" => Ok(Self::Real),
            "text" => Ok(Self::Text),
            _ => Err(DbError::invalid_input(format!(
                "Unknown column type '{}'. Expected one of: string, boolean, integer, float, text",
                s
            ))),
        }
    }
}

/// Zero-argument producer of a default value.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// What a field resolves to when a record has no stored value for it.
#[derive(Clone, Default)]
pub enum DefaultValue {
    #[default]
    None,
    Literal(Value),
    /// Invoked once per record, on first read.
    Factory(DefaultFactory),
}

impl DefaultValue {
    /// Produce the default, calling the factory if there is one.
    pub fn resolve(&self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Literal(value) => Some(value.clone()),
            Self::Factory(factory) => Some(factory()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// Declared metadata for one column.
///
/// Built with the per-kind constructors, which carry the kind's own default:
///
/// ```
/// use shapeorm::models::{Field, Value};
///
/// let id = Field::integer("id").primary_key();
/// assert_eq!(id.to_string(), "<IntegerField, bigint:id>");
///
/// let active = Field::boolean("active");
/// assert_eq!(active.default().resolve(), Some(Value::Bool(false)));
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    default: DefaultValue,
}

impl Field {
    fn new(name: impl Into<String>, column_type: ColumnType, default: DefaultValue) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            default,
        }
    }

    /// `varchar(100)` column, no default.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ColumnType::Varchar(DEFAULT_VARCHAR_LENGTH),
            DefaultValue::None,
        )
    }

    /// `boolean` column, defaults to `false`.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ColumnType::Boolean,
            DefaultValue::Literal(Value::Bool(false)),
        )
    }

    /// `bigint` column, defaults to `0`.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Bigint, DefaultValue::Literal(Value::Int(0)))
    }

    /// `real` column, defaults to `0.0`.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ColumnType::Real,
            DefaultValue::Literal(Value::Float(0.0)),
        )
    }

    /// `text` column, no default.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text, DefaultValue::None)
    }

    /// A field of the given column type with that type's standard default.
    pub fn of_type(name: impl Into<String>, column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Varchar(len) => Self::string(name).length(len),
            ColumnType::Boolean => Self::boolean(name),
            ColumnType::Bigint => Self::integer(name),
            ColumnType::Real => Self::float(name),
            ColumnType::Text => Self::text(name),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Literal(value.into());
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    /// Drop the kind's default so unset values stay unset.
    pub fn no_default(mut self) -> Self {
        self.default = DefaultValue::None;
        self
    }

    /// Set the varchar length. No effect on other column types.
    pub fn length(mut self, len: u32) -> Self {
        if let ColumnType::Varchar(_) = self.column_type {
            self.column_type = ColumnType::Varchar(len);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default(&self) -> &DefaultValue {
        &self.default
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {}:{}>",
            self.column_type.kind_name(),
            self.column_type.sql_type(),
            self.name
        )
    }
}

/// Parses the compact `name:type[:pk]` form used on the command line.
impl FromStr for Field {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        let mut parts = s.split(':');
        let name = parts.next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Field '{}' is missing a name. Expected name:type[:pk]",
                s
            )));
        }

        let column_type: ColumnType = parts
            .next()
            .ok_or_else(|| {
                DbError::invalid_input(format!(
                    "Field '{}' is missing a type. Expected name:type[:pk]",
                    s
                ))
            })?
            .parse()?;

        let field = Self::of_type(name, column_type);
        match parts.next().map(str::trim) {
            None => Ok(field),
            Some(flag) if flag.eq_ignore_ascii_case("pk") => match parts.next() {
                None => Ok(field.primary_key()),
                Some(_) => Err(DbError::invalid_input(format!(
                    "Field '{}' has trailing segments",
                    s
                ))),
            },
            Some(flag) => Err(DbError::invalid_input(format!(
                "Unknown field flag '{}' in '{}'. Only 'pk' is supported",
                flag, s
            ))),
        }
    }
}
