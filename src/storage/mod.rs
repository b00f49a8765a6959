//! # Storage and Persistence
//!
//! SQLite persistence for the Larder service: the connection pool and write
//! gate, embedded migrations, the generic record store, sessions and the
//! append-only audit journal.

pub mod audit_log;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod sessions;

pub use crate::config::DatabaseConfig;
pub use audit_log::{AuditEvent, AuditFilter, AuditLogEntry};
pub use migrations::{get_migration_version, list_applied_migrations, MigrationInfo};
pub use pool::{create_pool, Database, DbPool, WriteTransaction};
pub use records::{Column, Document, RecordFilter, RecordIndex, RecordRow};
pub use sessions::{AuthKind, SessionRecord};

use crate::errors::Result;

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}
