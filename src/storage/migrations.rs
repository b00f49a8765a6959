//! # Database Migration Management
//!
//! Schema evolution using SQL migrations embedded in the binary. Each migration
//! runs in its own transaction and is recorded in `_larder_migrations` with a
//! checksum, so a changed migration file is detected instead of silently skipped.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::{error, info};

use crate::errors::{LarderError, Result};
use crate::storage::DbPool;

/// Embedded migrations, ordered by version.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20260101000001_create_records",
        include_str!("../../migrations/20260101000001_create_records.sql"),
    ),
    (
        "20260101000002_create_sessions",
        include_str!("../../migrations/20260101000002_create_sessions.sql"),
    ),
    (
        "20260101000003_create_audit_log",
        include_str!("../../migrations/20260101000003_create_audit_log.sql"),
    ),
];

/// Migration information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: i64,
    pub execution_time: i64,
    pub checksum: String,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");
    create_migration_table(pool).await?;

    let applied = list_applied_migrations(pool).await?;
    let mut migrations_run = 0;

    for (filename, sql) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;
        let checksum = calculate_checksum(sql);

        if let Some(existing) = applied.iter().find(|m| m.version == version) {
            if existing.checksum != checksum {
                return Err(LarderError::internal(format!(
                    "Migration {} was modified after being applied",
                    filename
                )));
            }
            continue;
        }

        info!(version, "Running migration: {}", filename);
        let start_time = std::time::Instant::now();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| LarderError::database(e, "Failed to start migration transaction"))?;

        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
            error!(error = %e, migration = filename, "Migration failed");
            LarderError::database(e, format!("Migration failed: {}", filename))
        })?;

        let execution_time = start_time.elapsed().as_millis() as i64;
        sqlx::query(
            "INSERT INTO _larder_migrations (version, description, checksum, execution_time, installed_on) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(version)
        .bind(*filename)
        .bind(&checksum)
        .bind(execution_time)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| LarderError::database(e, format!("Failed to record migration: {}", filename)))?;

        tx.commit()
            .await
            .map_err(|e| LarderError::database(e, "Failed to commit migration transaction"))?;

        migrations_run += 1;
        info!(version, execution_time_ms = execution_time, "Migration completed: {}", filename);
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

/// Create the migration tracking table
async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _larder_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            checksum TEXT NOT NULL,
            execution_time INTEGER NOT NULL,
            installed_on INTEGER NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LarderError::database(e, "Failed to create migration tracking table"))?;

    Ok(())
}

/// List applied migrations, oldest first
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    let rows = sqlx::query(
        "SELECT version, description, checksum, execution_time, installed_on \
         FROM _larder_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| LarderError::database(e, "Failed to list applied migrations"))?;

    rows.into_iter()
        .map(|row| {
            Ok(MigrationInfo {
                version: row.try_get("version")?,
                description: row.try_get("description")?,
                checksum: row.try_get("checksum")?,
                execution_time: row.try_get("execution_time")?,
                installed_on: row.try_get("installed_on")?,
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| LarderError::database(e, "Failed to decode migration rows"))
}

/// Latest applied migration version, if any
pub async fn get_migration_version(pool: &DbPool) -> Result<Option<i64>> {
    Ok(list_applied_migrations(pool).await?.last().map(|m| m.version))
}

fn extract_version_from_filename(filename: &str) -> Result<i64> {
    filename
        .split('_')
        .next()
        .and_then(|prefix| prefix.parse::<i64>().ok())
        .ok_or_else(|| LarderError::internal(format!("Invalid migration filename: {}", filename)))
}

fn calculate_checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> DbPool {
        SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version_from_filename("20260101000001_create_records").unwrap(),
            20260101000001
        );
        assert!(extract_version_from_filename("create_records").is_err());
    }

    #[test]
    fn test_migrations_are_ordered() {
        let versions: Vec<i64> =
            MIGRATIONS.iter().map(|(name, _)| extract_version_from_filename(name).unwrap()).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let applied = list_applied_migrations(&pool).await.unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());
        assert_eq!(get_migration_version(&pool).await.unwrap(), Some(20260101000003));
    }

    #[tokio::test]
    async fn test_audit_log_is_append_only() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO audit_log (id, event_type, context, occurred_at) VALUES ('a', 'userCreated', '{}', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let update = sqlx::query("UPDATE audit_log SET event_type = 'x'").execute(&pool).await;
        assert!(update.is_err());
        let delete = sqlx::query("DELETE FROM audit_log").execute(&pool).await;
        assert!(delete.is_err());
    }
}
