//! # Schema Migrations
//!
//! Embedded SQL migrations for the offline store. The applied set is tracked
//! in sqlx's `_sqlx_migrations` table, which doubles as the schema version.
//!
//! ## Upgrade on Open
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Database::new()                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Compare embedded migrations vs _sqlx_migrations                        │
//! │       │                                                                 │
//! │       ├── 001_offline_cache.sql ✓ (already applied → skipped)           │
//! │       └── 00N_next.sql          ⬜ (pending → applied in order)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Any failure → DbError::StoreUnavailable, offline layer disabled        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create `migrations/sqlite/NNN_description.sql` with the next number
//! 2. Use `IF NOT EXISTS` so a half-applied upgrade can be re-run
//! 3. **NEVER** modify an existing migration; devices already applied it

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations from `migrations/sqlite`, embedded at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations. Safe to call on every open.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!(
        embedded = MIGRATOR.migrations.len(),
        "Checking for pending migrations"
    );

    MIGRATOR.run(pool).await?;

    info!("All migrations applied");
    Ok(())
}

/// Returns (total_migrations, applied_migrations).
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
