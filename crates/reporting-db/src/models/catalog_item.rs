//! Catalog item dimension.
//!
//! One row per catalog item (the resource governor name). Rows are created on
//! first sighting and never updated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How the environment behind a catalog item is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfraType {
    /// One environment per requester.
    Dedicated,
    /// A multi-user environment.
    Shared,
    /// A cloud sandbox account.
    Sandbox,
}

impl InfraType {
    /// Classify a catalog item from its class name and sandbox account.
    ///
    /// `SHARED` in the class name wins over `sandbox` in the account name.
    #[must_use]
    pub fn classify(class_name: &str, account: &str) -> Self {
        if class_name.contains("SHARED") {
            InfraType::Shared
        } else if account.contains("sandbox") {
            InfraType::Sandbox
        } else {
            InfraType::Dedicated
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InfraType::Dedicated => "Dedicated",
            InfraType::Shared => "Shared",
            InfraType::Sandbox => "Sandbox",
        }
    }
}

impl fmt::Display for InfraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfraType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Dedicated" => Ok(InfraType::Dedicated),
            "Shared" => Ok(InfraType::Shared),
            "Sandbox" => Ok(InfraType::Sandbox),
            other => Err(format!("unknown infra type: {other}")),
        }
    }
}

/// A catalog item row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i32,
    /// Natural key.
    pub catalog_item: String,
    pub catalog_name: Option<String>,
    pub class_name: Option<String>,
    pub infra_type: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a catalog item seen for the first time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub catalog_item: String,
    pub catalog_name: Option<String>,
    pub class_name: Option<String>,
    pub infra_type: InfraType,
}

impl CatalogItem {
    /// Insert the item unless its natural key exists; return the row id
    /// either way.
    pub async fn insert_or_get(
        pool: &sqlx::PgPool,
        item: &NewCatalogItem,
    ) -> Result<i32, sqlx::Error> {
        let id: Option<i32> = sqlx::query_scalar(
            r"
            WITH ins AS (
                INSERT INTO catalog_items (catalog_item, catalog_name, class_name, infra_type)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (catalog_item) DO NOTHING
                RETURNING id
            )
            SELECT id FROM ins
            UNION ALL
            SELECT id FROM catalog_items WHERE catalog_item = $1
            LIMIT 1
            ",
        )
        .bind(&item.catalog_item)
        .bind(&item.catalog_name)
        .bind(&item.class_name)
        .bind(item.infra_type.as_str())
        .fetch_optional(pool)
        .await?;

        match id {
            Some(id) => Ok(id),
            // Lost a race with a concurrent insert not yet visible to this
            // statement's snapshot.
            None => Self::find_id(pool, &item.catalog_item)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Find a catalog item id by natural key.
    pub async fn find_id(
        pool: &sqlx::PgPool,
        catalog_item: &str,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM catalog_items WHERE catalog_item = $1")
            .bind(catalog_item)
            .fetch_optional(pool)
            .await
    }

    /// Find a catalog item by natural key.
    pub async fn find_by_key(
        pool: &sqlx::PgPool,
        catalog_item: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT id, catalog_item, catalog_name, class_name, infra_type, created_at
            FROM catalog_items
            WHERE catalog_item = $1
            ",
        )
        .bind(catalog_item)
        .fetch_optional(pool)
        .await
    }

    /// Parsed infrastructure type.
    #[must_use]
    pub fn infra(&self) -> Option<InfraType> {
        self.infra_type.parse().ok()
    }
}
