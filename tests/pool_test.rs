use shapeorm::config::PoolConfig;
use shapeorm::db::{ConnectionManager, DbPool, create_pool};
use shapeorm::error::DbError;
use shapeorm::models::DatabaseType;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::timeout;

fn sqlite_config(temp_file: &NamedTempFile) -> PoolConfig {
    let db_path = temp_file.path().to_str().unwrap().to_string();
    PoolConfig::sqlite(db_path)
}

#[tokio::test]
async fn test_acquire_waits_while_pool_exhausted() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = sqlite_config(&temp_file).with_pool_size(1, 1);
    let pool = create_pool(&config).await.unwrap();
    assert_eq!(pool.db_type(), DatabaseType::SQLite);

    let held = pool.acquire().await.unwrap();
    let blocked = timeout(Duration::from_millis(200), pool.acquire()).await;
    assert!(blocked.is_err(), "second acquire should still be waiting");

    drop(held);
    let again = timeout(Duration::from_secs(2), pool.acquire()).await;
    assert!(matches!(again, Ok(Ok(_))));
    assert_eq!(pool.size(), 1);
}

#[tokio::test]
async fn test_acquire_timeout_is_driver_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = sqlite_config(&temp_file)
        .with_pool_size(1, 1)
        .with_acquire_timeout(1);
    let pool = create_pool(&config).await.unwrap();

    let _held = pool.acquire().await.unwrap();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, DbError::Execution(sqlx::Error::PoolTimedOut)));
}

#[tokio::test]
async fn test_closed_pool_rejects_acquire() {
    let temp_file = NamedTempFile::new().unwrap();
    let pool = create_pool(&sqlite_config(&temp_file)).await.unwrap();

    pool.close().await;
    assert!(pool.is_closed());
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, DbError::Execution(sqlx::Error::PoolClosed)));
}

#[tokio::test]
async fn test_invalid_config_fails_before_connecting() {
    let config = PoolConfig::new(DatabaseType::PostgreSQL, "", "secret", "app");
    let err = create_pool(&config).await.unwrap_err();
    assert!(matches!(err, DbError::Configuration { .. }));

    let config = PoolConfig::sqlite("unused.db").with_pool_size(3, 2);
    let err = create_pool(&config).await.unwrap_err();
    assert!(matches!(err, DbError::Configuration { .. }));
}

#[tokio::test]
async fn test_manager_one_pool_per_target() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = sqlite_config(&temp_file);
    let manager = ConnectionManager::new();

    let pool = manager.connect("main", &config).await.unwrap();
    assert!(matches!(pool, DbPool::SQLite(_)));
    assert!(manager.exists("main").await);

    let err = manager.connect("main", &config).await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionExists { .. }));
    assert_eq!(manager.connection_count().await, 1);

    manager.close("main").await.unwrap();
    assert!(pool.is_closed());
    assert!(matches!(
        manager.get("main").await,
        Err(DbError::ConnectionNotFound { .. })
    ));

    // Closing frees the id for a fresh pool.
    manager.connect("main", &config).await.unwrap();
    manager.connect("replica", &config).await.unwrap();
    assert_eq!(manager.connection_count().await, 2);

    let replica = manager.get("replica").await.unwrap();
    manager.close_all().await;
    assert_eq!(manager.connection_count().await, 0);
    assert!(replica.is_closed());
}

#[tokio::test]
async fn test_pool_from_url() {
    let temp_file = NamedTempFile::new().unwrap();
    let url = format!(
        "sqlite:{}?max_pool_size=2&acquire_timeout=5",
        temp_file.path().to_str().unwrap()
    );
    let config = PoolConfig::from_url(&url).unwrap();
    let pool = create_pool(&config).await.unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    assert_eq!(first.db_type(), DatabaseType::SQLite);
    assert_eq!(second.db_type(), DatabaseType::SQLite);
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.num_idle(), 0);
}
