//! Data models for shapeorm.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod field;
pub mod record;
pub mod shape;
pub mod value;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use field::{ColumnType, DEFAULT_VARCHAR_LENGTH, DefaultFactory, DefaultValue, Field};
pub use record::{Record, RecordState};
pub use shape::{Shape, ShapeBuilder};
pub use value::{Row, Value};
