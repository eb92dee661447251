//! Manager dimension and the chargeback manager set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A manager row. Created once per email and never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Manager {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub kerberos_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Manager {
    /// Insert the manager unless the email exists; return the row id either way.
    pub async fn insert_or_get(
        pool: &sqlx::PgPool,
        email: &str,
        name: Option<&str>,
        kerberos_id: Option<&str>,
    ) -> Result<i32, sqlx::Error> {
        let id: Option<i32> = sqlx::query_scalar(
            r"
            WITH ins AS (
                INSERT INTO manager (email, name, kerberos_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (email) DO NOTHING
                RETURNING id
            )
            SELECT id FROM ins
            UNION ALL
            SELECT id FROM manager WHERE email = $1
            LIMIT 1
            ",
        )
        .bind(email)
        .bind(name)
        .bind(kerberos_id)
        .fetch_optional(pool)
        .await?;

        match id {
            Some(id) => Ok(id),
            None => Self::find_by_email(pool, email)
                .await?
                .map(|m| m.id)
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Find a manager by email.
    pub async fn find_by_email(
        pool: &sqlx::PgPool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, email, name, kerberos_id, created_at FROM manager WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }
}

/// A manager authorized to be billed for their organization's usage.
///
/// Maintained outside this system; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ManagerChargeback {
    pub id: i32,
    pub email: String,
}

impl ManagerChargeback {
    /// Load the whole chargeback set.
    pub async fn list_all(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, email FROM manager_chargeback ORDER BY id")
            .fetch_all(pool)
            .await
    }
}
