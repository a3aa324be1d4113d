//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - Statement execution
//! - Placeholder rewriting per backend
//! - Type mappings

pub mod executor;
pub mod params;
pub mod placeholder;
pub mod pool;
pub mod types;

pub use executor::{QueryExecutor, SqlExecutor};
pub use pool::{ConnectionManager, DbPool, PooledConnection, create_pool};
