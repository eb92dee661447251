//! Lifecycle log: append-only trail of state transitions per provision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A lifecycle log row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LifecycleLogEntry {
    pub id: i64,
    pub provision_uuid: String,
    pub logged_at: DateTime<Utc>,
    pub operation: String,
    pub executor: Option<String>,
}

impl LifecycleLogEntry {
    /// Most recent operation logged for the uuid.
    pub async fn latest_operation(
        pool: &sqlx::PgPool,
        provision_uuid: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r"
            SELECT operation FROM lifecycle_log
            WHERE provision_uuid = $1
            ORDER BY logged_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(provision_uuid)
        .fetch_optional(pool)
        .await
    }

    /// Append `operation` unless it equals the latest logged operation.
    ///
    /// Appends for one uuid are serialized with a transaction-scoped advisory
    /// lock so concurrent duplicates cannot both pass the comparison.
    /// Returns whether a row was written.
    pub async fn append_if_changed(
        pool: &sqlx::PgPool,
        provision_uuid: &str,
        operation: &str,
        executor: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(provision_uuid)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r"
            INSERT INTO lifecycle_log (provision_uuid, logged_at, operation, executor)
            SELECT $1::text, NOW(), $2::text, $3::text
            WHERE (
                SELECT operation FROM lifecycle_log
                WHERE provision_uuid = $1::text
                ORDER BY logged_at DESC, id DESC
                LIMIT 1
            ) IS DISTINCT FROM $2::text
            ",
        )
        .bind(provision_uuid)
        .bind(operation)
        .bind(executor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected() == 1)
    }

    /// All entries for the uuid, oldest first.
    pub async fn list_for(
        pool: &sqlx::PgPool,
        provision_uuid: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT id, provision_uuid, logged_at, operation, executor
            FROM lifecycle_log
            WHERE provision_uuid = $1
            ORDER BY logged_at, id
            ",
        )
        .bind(provision_uuid)
        .fetch_all(pool)
        .await
    }
}
