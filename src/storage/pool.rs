//! # Database Connection Pool Management
//!
//! Pool creation plus the [`Database`] handle every service works through.
//!
//! Reads borrow a pooled connection. Writes open a transaction while holding a
//! process-wide write gate, so read-modify-write sequences (ballot vs.
//! finalization, member removal vs. backup household synthesis, invitation
//! acceptance) observe and commit a consistent snapshot.

use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::DatabaseConfig;
use crate::errors::{LarderError, Result};

/// Type alias for the database connection pool
pub type DbPool = Pool<Sqlite>;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a database connection pool with the specified configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    validate_config(config)?;

    let connect_options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| LarderError::database(e, format!("Invalid SQLite connection string: {}", config.url)))?
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .foreign_keys(true);

    // Every connection to `:memory:` is a separate database, so an in-memory
    // pool is pinned to one connection that is never recycled.
    let pool_options = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        let options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .test_before_acquire(true);
        match config.idle_timeout() {
            Some(idle_timeout) => options.idle_timeout(idle_timeout),
            None => options,
        }
    };

    let connect_options = if config.is_in_memory() {
        connect_options
    } else {
        connect_options.journal_mode(SqliteJournalMode::Wal)
    };

    let pool = pool_options
        .acquire_timeout(config.connect_timeout())
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, url = %config.url, "Failed to create SQLite database pool");
            LarderError::database(e, format!("Failed to connect to database: {}", config.url))
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        in_memory = config.is_in_memory(),
        connect_timeout_ms = config.connect_timeout().as_millis() as u64,
        "Database connection pool created"
    );

    if config.auto_migrate {
        tracing::info!("Auto-migration enabled, running database migrations");
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Validate database configuration
fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(LarderError::validation("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(LarderError::validation(
            "min_connections cannot be greater than max_connections",
        ));
    }

    if !config.url.starts_with("sqlite:") {
        return Err(LarderError::validation("database URL must start with 'sqlite:'"));
    }

    Ok(())
}

/// Shared handle over the pool and the write gate.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    write_gate: Arc<Mutex<()>>,
}

impl Database {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, write_gate: Arc::new(Mutex::new(())) }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Borrow a connection for reads.
    pub async fn read(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(|e| LarderError::database(e, "Failed to acquire connection"))
    }

    /// Begin a serialized write transaction.
    ///
    /// The gate is taken before the connection so waiting writers never hold a
    /// pooled connection.
    pub async fn write(&self) -> Result<WriteTransaction> {
        let gate = self.write_gate.clone().lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LarderError::database(e, "Failed to begin transaction"))?;
        Ok(WriteTransaction { tx, _gate: gate })
    }

    /// Liveness probe used by the readiness endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| LarderError::database(e, "Database ping failed"))
    }
}

/// A transaction that holds the write gate until committed or dropped.
///
/// Dropping without [`WriteTransaction::commit`] rolls back.
pub struct WriteTransaction {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl WriteTransaction {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| LarderError::database(e, "Failed to commit transaction"))
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig { url: "sqlite::memory:".to_string(), ..Default::default() }
    }

    #[test]
    fn test_validate_config_valid() {
        let config = DatabaseConfig {
            url: "sqlite://./test.db".to_string(),
            max_connections: 10,
            min_connections: 2,
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_invalid_max_connections() {
        let config = DatabaseConfig { max_connections: 0, ..memory_config() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_invalid_url_scheme() {
        let config =
            DatabaseConfig { url: "mysql://localhost/test".to_string(), ..Default::default() };
        assert!(validate_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_create_pool_runs_migrations() {
        let pool = create_pool(&memory_config()).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_write_transaction_rolls_back_on_drop() {
        let db = Database::new(create_pool(&memory_config()).await.unwrap());
        {
            let mut tx = db.write().await.unwrap();
            sqlx::query(
                "INSERT INTO records (kind, id, data, created_at) VALUES ('probe', 'p1', '{}', 0)",
            )
            .execute(&mut *tx)
            .await
            .unwrap();
        }

        let mut conn = db.read().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 0);
        db.ping().await.unwrap();
    }
}
