//! # Database Migrations
//!
//! Embedded SQL migrations for the BizBook schema.
//!
//! ## Migration Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Compile time:  sqlx::migrate!() embeds migrations/sqlite/*.sql         │
//! │  Runtime:       Database::new() → run_migrations()                      │
//! │                   └── applies pending files in order, records them in  │
//! │                       _sqlx_migrations                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)`.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
