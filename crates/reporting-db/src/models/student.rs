//! Student (requester) dimension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A student row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: i32,
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub geo: Option<String>,
    pub partner: Option<String>,
    pub cost_center: Option<String>,
    pub kerberos_id: Option<String>,
    pub manager: Option<String>,
    pub manager_email: Option<String>,
    pub title: Option<String>,
    pub check_headcount: bool,
    pub company_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile written on every sighting of a student.
///
/// Identity fields are only written by the first insert; `geo`, `partner`,
/// `cost_center`, `manager`, `manager_email` and `title` are refreshed by
/// later sightings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub geo: Option<String>,
    pub partner: Option<String>,
    pub cost_center: Option<String>,
    pub kerberos_id: Option<String>,
    pub manager: Option<String>,
    pub manager_email: Option<String>,
    pub title: Option<String>,
    pub check_headcount: bool,
    pub company_id: Option<i32>,
}

impl Student {
    /// Insert the student, or refresh the mutable profile fields of the
    /// existing row. Returns the row id.
    pub async fn upsert(pool: &sqlx::PgPool, profile: &StudentProfile) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            r"
            INSERT INTO students (
                email, username, full_name, first_name, last_name, geo, partner,
                cost_center, kerberos_id, manager, manager_email, title,
                check_headcount, company_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (email) DO UPDATE SET
                geo = EXCLUDED.geo,
                partner = EXCLUDED.partner,
                cost_center = EXCLUDED.cost_center,
                manager = EXCLUDED.manager,
                manager_email = EXCLUDED.manager_email,
                title = EXCLUDED.title,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&profile.email)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.geo)
        .bind(&profile.partner)
        .bind(&profile.cost_center)
        .bind(&profile.kerberos_id)
        .bind(&profile.manager)
        .bind(&profile.manager_email)
        .bind(&profile.title)
        .bind(profile.check_headcount)
        .bind(profile.company_id)
        .fetch_one(pool)
        .await
    }

    /// Find a student by email.
    pub async fn find_by_email(
        pool: &sqlx::PgPool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM students WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}
