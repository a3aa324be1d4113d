//! shapeorm library
//!
//! Declare record shapes once, get their CRUD SQL derived up front, and run
//! it through a bounded connection pool (SQLite, PostgreSQL, MySQL).

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::PoolConfig;
pub use db::{ConnectionManager, DbPool, QueryExecutor, SqlExecutor};
pub use error::{DbError, DbResult};
pub use models::{Field, Record, Shape, Value};
