//! Provision fact table.
//!
//! One row per resource instance, created exactly once. Only the failure
//! attribution and retirement updates touch an existing row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_FAILURE: &str = "failure";

/// A provision row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Provision {
    pub id: i32,
    pub uuid: String,
    pub catalog_id: i32,
    pub student_id: i32,
    pub manager_id: Option<i32>,
    pub manager_chargeback_id: Option<i32>,
    pub opportunity_id: Option<i32>,
    pub provisioned_at: DateTime<Utc>,
    pub workshop_users: Option<i32>,
    pub service_type: String,
    pub account: String,
    pub sandbox_name: Option<String>,
    pub provision_result: String,
    pub cloud: String,
    pub cloud_region: Option<String>,
    pub environment: String,
    pub class_name: Option<String>,
    pub chargeback_method: Option<String>,
    pub purpose: Option<String>,
    pub datasource: String,
    pub babylon_guid: Option<String>,
    pub cost_center: Option<String>,
    pub student_geo: Option<String>,
    pub retired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a provision at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProvision {
    pub uuid: String,
    pub catalog_id: i32,
    pub student_id: i32,
    pub manager_id: Option<i32>,
    pub manager_chargeback_id: Option<i32>,
    pub opportunity_id: Option<i32>,
    pub provisioned_at: DateTime<Utc>,
    pub workshop_users: Option<i32>,
    pub service_type: String,
    pub account: String,
    pub sandbox_name: Option<String>,
    pub provision_result: String,
    pub cloud: String,
    pub cloud_region: Option<String>,
    pub environment: String,
    pub class_name: Option<String>,
    pub chargeback_method: Option<String>,
    pub purpose: Option<String>,
    pub datasource: String,
    pub babylon_guid: Option<String>,
    pub cost_center: Option<String>,
    pub student_geo: Option<String>,
}

impl Provision {
    /// Whether a provision exists for the uuid.
    pub async fn exists(pool: &sqlx::PgPool, uuid: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM provisions WHERE uuid = $1)")
            .bind(uuid)
            .fetch_one(pool)
            .await
    }

    /// Find a provision by uuid.
    pub async fn find_by_uuid(
        pool: &sqlx::PgPool,
        uuid: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM provisions WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(pool)
            .await
    }

    /// Insert a provision. Returns `false` when the uuid already exists.
    pub async fn insert(pool: &sqlx::PgPool, new: &NewProvision) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            INSERT INTO provisions (
                uuid, catalog_id, student_id, manager_id, manager_chargeback_id,
                opportunity_id, provisioned_at, workshop_users, service_type, account,
                sandbox_name, provision_result, cloud, cloud_region, environment,
                class_name, chargeback_method, purpose, datasource, babylon_guid,
                cost_center, student_geo
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            ON CONFLICT (uuid) DO NOTHING
            ",
        )
        .bind(&new.uuid)
        .bind(new.catalog_id)
        .bind(new.student_id)
        .bind(new.manager_id)
        .bind(new.manager_chargeback_id)
        .bind(new.opportunity_id)
        .bind(new.provisioned_at)
        .bind(new.workshop_users)
        .bind(&new.service_type)
        .bind(&new.account)
        .bind(&new.sandbox_name)
        .bind(&new.provision_result)
        .bind(&new.cloud)
        .bind(&new.cloud_region)
        .bind(&new.environment)
        .bind(&new.class_name)
        .bind(&new.chargeback_method)
        .bind(&new.purpose)
        .bind(&new.datasource)
        .bind(&new.babylon_guid)
        .bind(&new.cost_center)
        .bind(&new.student_geo)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Attribute a failure to the provision. Returns `false` when no row
    /// exists for the uuid.
    pub async fn mark_failed(pool: &sqlx::PgPool, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE provisions
            SET provision_result = $2, updated_at = NOW()
            WHERE uuid = $1
            ",
        )
        .bind(uuid)
        .bind(RESULT_FAILURE)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the retirement time once. Returns `false` when the provision is
    /// missing or already retired.
    pub async fn retire(
        pool: &sqlx::PgPool,
        uuid: &str,
        retired_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE provisions
            SET retired_at = $2, updated_at = NOW()
            WHERE uuid = $1 AND retired_at IS NULL
            ",
        )
        .bind(uuid)
        .bind(retired_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
