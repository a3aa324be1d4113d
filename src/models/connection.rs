//! Backend selection.

use serde::{Deserialize, Serialize};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    #[default]
    #[serde(alias = "mariadb")]
    MySQL,
    #[serde(alias = "postgres")]
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySQL),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::PostgreSQL => Some(5432),
            Self::MySQL => Some(3306),
            Self::SQLite => None,
        }
    }

    /// Whether connecting needs a user and password.
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Self::SQLite)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
