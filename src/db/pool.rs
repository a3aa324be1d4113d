//! Connection pool management.
//!
//! Pools are database-specific (`MySqlPool`, `PgPool`, `SqlitePool`) behind
//! one [`DbPool`] enum. A pool bounds the number of live connections at
//! `max_pool_size`; [`DbPool::acquire`] suspends while all of them are
//! borrowed. The returned [`PooledConnection`] goes back to the pool when it
//! is dropped, on every exit path of the borrowing code.

use crate::config::PoolConfig;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlx::pool::PoolConnection;
use sqlx::{
    Executor, MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool, mysql::MySqlConnectOptions,
    mysql::MySqlPoolOptions, postgres::PgConnectOptions, postgres::PgPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool. Waits for borrowed connections to come back.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::MySql(pool) => pool.is_closed(),
            DbPool::Postgres(pool) => pool.is_closed(),
            DbPool::SQLite(pool) => pool.is_closed(),
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Borrow a connection, waiting until one is free.
    ///
    /// Waiting is bounded by the pool's acquire timeout; on expiry the
    /// driver's `PoolTimedOut` error is returned as is.
    pub async fn acquire(&self) -> DbResult<PooledConnection> {
        let conn = match self {
            DbPool::MySql(pool) => PooledConnection::MySql(pool.acquire().await?),
            DbPool::Postgres(pool) => PooledConnection::Postgres(pool.acquire().await?),
            DbPool::SQLite(pool) => PooledConnection::SQLite(pool.acquire().await?),
        };
        Ok(conn)
    }

    /// Number of live connections, idle or borrowed.
    pub fn size(&self) -> u32 {
        match self {
            DbPool::MySql(pool) => pool.size(),
            DbPool::Postgres(pool) => pool.size(),
            DbPool::SQLite(pool) => pool.size(),
        }
    }

    pub fn num_idle(&self) -> usize {
        match self {
            DbPool::MySql(pool) => pool.num_idle(),
            DbPool::Postgres(pool) => pool.num_idle(),
            DbPool::SQLite(pool) => pool.num_idle(),
        }
    }
}

/// A connection borrowed from a [`DbPool`]. Returned to the pool on drop.
#[derive(Debug)]
pub enum PooledConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

impl PooledConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            PooledConnection::MySql(_) => DatabaseType::MySQL,
            PooledConnection::Postgres(_) => DatabaseType::PostgreSQL,
            PooledConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// Create a connection pool for the given configuration.
///
/// Fails with a configuration error when required options are missing, and
/// with the driver's error when the first connection cannot be opened.
pub async fn create_pool(config: &PoolConfig) -> DbResult<DbPool> {
    config.validate()?;

    let min = config.min_pool_size_or_default();
    let max = config.max_pool_size_or_default();
    let acquire_timeout = config.acquire_timeout_or_default();
    // validate() guarantees these are present for server backends
    let database = config.database_name.clone().unwrap_or_default();
    let user = config.user.clone().unwrap_or_default();
    let password = config.password.clone().unwrap_or_default();

    info!(
        backend = %config.backend,
        host = %config.host_or_default(),
        port = config.port_or_default(),
        database = %database,
        min_pool_size = min,
        max_pool_size = max,
        "Creating database connection pool"
    );

    match config.backend {
        DatabaseType::MySQL => {
            let options = MySqlConnectOptions::new()
                .host(config.host_or_default())
                .port(config.port_or_default())
                .username(&user)
                .password(&password)
                .database(&database)
                .charset(config.character_set_or_default());

            let mut pool_options = MySqlPoolOptions::new()
                .min_connections(min)
                .max_connections(max)
                .acquire_timeout(acquire_timeout);
            if !config.autocommit_or_default() {
                pool_options = pool_options.after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET autocommit = 0").await?;
                        Ok(())
                    })
                });
            }

            let pool = pool_options.connect_with(options).await?;
            Ok(DbPool::MySql(pool))
        }
        DatabaseType::PostgreSQL => {
            if !config.autocommit_or_default() {
                warn!("autocommit=false is not supported for PostgreSQL; statements autocommit");
            }
            if !config.character_set_or_default().eq_ignore_ascii_case("utf8") {
                warn!(
                    character_set = %config.character_set_or_default(),
                    "PostgreSQL connections always use UTF8; character_set ignored"
                );
            }
            let options = PgConnectOptions::new()
                .host(config.host_or_default())
                .port(config.port_or_default())
                .username(&user)
                .password(&password)
                .database(&database);

            let pool = PgPoolOptions::new()
                .min_connections(min)
                .max_connections(max)
                .acquire_timeout(acquire_timeout)
                .connect_with(options)
                .await?;
            Ok(DbPool::Postgres(pool))
        }
        DatabaseType::SQLite => {
            if !config.autocommit_or_default() {
                warn!("autocommit=false is not supported for SQLite; statements autocommit");
            }
            let options = SqliteConnectOptions::new()
                .filename(&database)
                .create_if_missing(true);

            let pool = SqlitePoolOptions::new()
                .min_connections(min)
                .max_connections(max)
                .acquire_timeout(acquire_timeout)
                .connect_with(options)
                .await?;
            Ok(DbPool::SQLite(pool))
        }
    }
}

/// Registry holding exactly one pool per named target.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    pools: Arc<RwLock<HashMap<String, DbPool>>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool for `config` and register it under `id`.
    ///
    /// A second `connect` for an id that is already registered is rejected;
    /// close the existing pool first.
    pub async fn connect(&self, id: &str, config: &PoolConfig) -> DbResult<DbPool> {
        // Early check for existing connection
        {
            let pools = self.pools.read().await;
            if pools.contains_key(id) {
                return Err(DbError::connection_exists(id));
            }
        }

        info!(connection_id = %id, backend = %config.backend, "Connecting to database");
        let pool = create_pool(config).await?;

        // Re-check after async work to prevent TOCTOU race
        let duplicate = {
            let mut pools = self.pools.write().await;
            if pools.contains_key(id) {
                true
            } else {
                pools.insert(id.to_string(), pool.clone());
                false
            }
        };

        if duplicate {
            // Close the pool we just created outside of lock
            pool.close().await;
            return Err(DbError::connection_exists(id));
        }

        info!(connection_id = %id, "Connected successfully");
        Ok(pool)
    }

    /// Get a connection pool by ID.
    pub async fn get(&self, id: &str) -> DbResult<DbPool> {
        let pools = self.pools.read().await;
        pools
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::connection_not_found(id))
    }

    /// Close one pool and forget it. The id can be connected again afterwards.
    pub async fn close(&self, id: &str) -> DbResult<()> {
        let pool = {
            let mut pools = self.pools.write().await;
            pools.remove(id)
        };
        match pool {
            Some(pool) => {
                info!(connection_id = %id, "Closing connection");
                pool.close().await;
                Ok(())
            }
            None => Err(DbError::connection_not_found(id)),
        }
    }

    /// Close all connections and clear the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(String, DbPool)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };
        for (id, pool) in drained {
            info!(connection_id = %id, "Closing connection");
            pool.close().await;
        }
        info!("All connections closed");
    }

    /// List all active connection IDs.
    pub async fn list_connections(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        pools.keys().cloned().collect()
    }

    pub async fn exists(&self, id: &str) -> bool {
        let pools = self.pools.read().await;
        pools.contains_key(id)
    }

    /// Get the number of active connections.
    pub async fn connection_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.len()
    }
}
