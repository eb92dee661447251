//! Embedded schema migrations.

use crate::error::DbError;
use crate::pool::DbPool;

/// Bring the reporting schema up to date.
///
/// The SQL files under `migrations/` are compiled into the binary; already
/// applied versions are skipped.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("./migrations");
    let versions = migrator.iter().count();

    migrator
        .run(pool.inner())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!(versions, "Reporting schema up to date");
    Ok(())
}
