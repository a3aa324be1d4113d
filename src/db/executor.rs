//! Statement execution against a connection pool.
//!
//! Every call borrows one connection from the pool, runs a single statement
//! with positional arguments, and hands the connection back before
//! returning, whether the statement succeeded or not.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch and execute
//! - `postgres`: PostgreSQL-specific fetch and execute
//! - `sqlite`: SQLite-specific fetch and execute
//!
//! Statements are written with `?` placeholders and backtick-quoted
//! identifiers; see [`to_native`] for the per-backend rewrite.

use crate::db::placeholder::to_native;
use crate::db::pool::{DbPool, PooledConnection};
use crate::db::types::RowToValues;
use crate::error::{DbError, DbResult};
use crate::models::{Row, Value};
use futures_util::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Runs parameterized statements. Records use this to load and persist.
pub trait SqlExecutor {
    /// Run a query and return its rows, at most `size` of them when given.
    fn select(
        &self,
        sql: &str,
        args: &[Value],
        size: Option<usize>,
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Run a modifying statement and return the affected-row count.
    fn execute(&self, sql: &str, args: &[Value]) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Pool-backed [`SqlExecutor`].
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: DbPool,
    statement_timeout: Option<Duration>,
}

impl QueryExecutor {
    /// Create an executor over a pool. Statements run without a time limit.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Bound each statement's run time. The connection is still returned
    /// to the pool when the limit is hit.
    pub fn with_statement_timeout(mut self, limit: Duration) -> Self {
        self.statement_timeout = Some(limit);
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn limited<T>(
        &self,
        operation: &str,
        work: impl Future<Output = DbResult<T>>,
    ) -> DbResult<T> {
        match self.statement_timeout {
            None => work.await,
            Some(limit) => match timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(DbError::timeout(operation, limit)),
            },
        }
    }
}

impl SqlExecutor for QueryExecutor {
    async fn select(&self, sql: &str, args: &[Value], size: Option<usize>) -> DbResult<Vec<Row>> {
        info!(sql = %sql, args = args.len(), "SQL");
        let native = to_native(sql, self.pool.db_type())?;
        let mut conn = self.pool.acquire().await?;

        let rows = self
            .limited("query execution", async {
                match &mut conn {
                    PooledConnection::MySql(c) => mysql::fetch_rows(c, &native, args, size).await,
                    PooledConnection::Postgres(c) => {
                        postgres::fetch_rows(c, &native, args, size).await
                    }
                    PooledConnection::SQLite(c) => sqlite::fetch_rows(c, &native, args, size).await,
                }
            })
            .await?;

        info!(rows = rows.len(), "Rows returned");
        Ok(rows)
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<u64> {
        info!(sql = %sql, args = args.len(), "SQL");
        let native = to_native(sql, self.pool.db_type())?;
        let mut conn = self.pool.acquire().await?;

        let affected = self
            .limited("statement execution", async {
                match &mut conn {
                    PooledConnection::MySql(c) => mysql::execute(c, &native, args).await,
                    PooledConnection::Postgres(c) => postgres::execute(c, &native, args).await,
                    PooledConnection::SQLite(c) => sqlite::execute(c, &native, args).await,
                }
            })
            .await?;

        debug!(rows_affected = affected, "Statement executed");
        Ok(affected)
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R: RowToValues>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<Row>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?.to_row()?);
    }
    Ok(rows)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_value;
    use sqlx::MySqlConnection;

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        args: &[Value],
        size: Option<usize>,
    ) -> DbResult<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_mysql_value(query, arg);
        }
        let results = match size {
            Some(n) => query.fetch(&mut *conn).take(n).collect::<Vec<_>>().await,
            None => query.fetch(&mut *conn).collect::<Vec<_>>().await,
        };
        collect_rows(results)
    }

    pub async fn execute(conn: &mut MySqlConnection, sql: &str, args: &[Value]) -> DbResult<u64> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_mysql_value(query, arg);
        }
        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_value;
    use sqlx::PgConnection;

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        args: &[Value],
        size: Option<usize>,
    ) -> DbResult<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_postgres_value(query, arg);
        }
        let results = match size {
            Some(n) => query.fetch(&mut *conn).take(n).collect::<Vec<_>>().await,
            None => query.fetch(&mut *conn).collect::<Vec<_>>().await,
        };
        collect_rows(results)
    }

    pub async fn execute(conn: &mut PgConnection, sql: &str, args: &[Value]) -> DbResult<u64> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_postgres_value(query, arg);
        }
        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_value;
    use sqlx::SqliteConnection;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        args: &[Value],
        size: Option<usize>,
    ) -> DbResult<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_sqlite_value(query, arg);
        }
        let results = match size {
            Some(n) => query.fetch(&mut *conn).take(n).collect::<Vec<_>>().await,
            None => query.fetch(&mut *conn).collect::<Vec<_>>().await,
        };
        collect_rows(results)
    }

    pub async fn execute(conn: &mut SqliteConnection, sql: &str, args: &[Value]) -> DbResult<u64> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_sqlite_value(query, arg);
        }
        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::db::pool::create_pool;

    async fn memory_executor() -> QueryExecutor {
        let config = PoolConfig::sqlite(":memory:").with_pool_size(1, 1);
        let pool = create_pool(&config).await.unwrap();
        QueryExecutor::new(pool)
    }

    #[tokio::test]
    async fn test_select_respects_size() {
        let executor = memory_executor().await;
        executor
            .execute("CREATE TABLE `t` (`id` bigint PRIMARY KEY, `a` text)", &[])
            .await
            .unwrap();
        for id in 1..=3 {
            let affected = executor
                .execute(
                    "INSERT INTO `t` (`a`, `id`) VALUES (?, ?)",
                    &[Value::from("x"), Value::from(id)],
                )
                .await
                .unwrap();
            assert_eq!(affected, 1);
        }

        let all = executor.select("SELECT `id`, `a` FROM `t`", &[], None).await.unwrap();
        assert_eq!(all.len(), 3);
        let two = executor.select("SELECT `id`, `a` FROM `t`", &[], Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].get("a"), Some(&Value::from("x")));
    }

    #[tokio::test]
    async fn test_connection_returned_after_error() {
        let executor = memory_executor().await;
        let err = executor
            .select("SELECT * FROM `missing`", &[], None)
            .await
            .unwrap_err();
        assert!(err.as_sqlx().is_some());

        // With a single-connection pool this only succeeds if the failed
        // statement released its connection.
        let rows = executor.select("SELECT 1 AS `one`", &[], None).await.unwrap();
        assert_eq!(rows[0].get("one"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_undecodable_column_is_an_error() {
        let executor = memory_executor().await;
        executor
            .execute("CREATE TABLE `t` (`id` bigint PRIMARY KEY, `n` bigint)", &[])
            .await
            .unwrap();
        executor
            .execute(
                "INSERT INTO `t` (`n`, `id`) VALUES (?, ?)",
                &[Value::Float(2.5), Value::Int(1)],
            )
            .await
            .unwrap();

        let err = executor
            .select("SELECT `id`, `n` FROM `t`", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_sqlx(), Some(sqlx::Error::ColumnDecode { .. })));

        // NULL still decodes as a value
        executor
            .execute("UPDATE `t` SET `n` = ? WHERE `id` = ?", &[Value::Null, Value::Int(1)])
            .await
            .unwrap();
        let rows = executor.select("SELECT `id`, `n` FROM `t`", &[], None).await.unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Null));
    }
}
