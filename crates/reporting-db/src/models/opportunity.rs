//! Sales opportunity dimension.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An opportunity row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: i32,
    pub opportunity_id: Option<String>,
    pub number: Option<String>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub amount: Option<Decimal>,
    pub closed_at: Option<NaiveDate>,
    pub expected_revenue: Option<Decimal>,
    pub is_closed: Option<bool>,
    pub opportunity_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub owner_title: Option<String>,
    pub stage: Option<String>,
    #[sqlx(rename = "type")]
    pub opportunity_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which natural key the CRM lookup matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunityKey {
    Number,
    OpportunityId,
}

/// Full field set written on insert or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityFields {
    pub opportunity_id: String,
    pub number: Option<String>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub amount: Option<Decimal>,
    pub closed_at: Option<NaiveDate>,
    pub expected_revenue: Option<Decimal>,
    pub is_closed: Option<bool>,
    pub opportunity_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub owner_title: Option<String>,
    pub stage: Option<String>,
    pub opportunity_type: Option<String>,
}

impl Opportunity {
    /// Insert the opportunity, or overwrite every field of the row matching
    /// `key`. Returns the row id.
    ///
    /// A row stored earlier under the other natural key trips the other
    /// unique constraint; that row is updated instead and keeps its keys.
    pub async fn upsert(
        pool: &sqlx::PgPool,
        fields: &OpportunityFields,
        key: OpportunityKey,
    ) -> Result<i32, sqlx::Error> {
        match Self::upsert_on(pool, fields, key).await {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                let existing =
                    Self::find_by_keys(pool, &fields.opportunity_id, fields.number.as_deref())
                        .await?;
                match existing {
                    Some(row) => Self::update_fields(pool, row.id, fields).await,
                    None => Err(sqlx::Error::Database(e)),
                }
            }
            other => other,
        }
    }

    async fn upsert_on(
        pool: &sqlx::PgPool,
        fields: &OpportunityFields,
        key: OpportunityKey,
    ) -> Result<i32, sqlx::Error> {
        let conflict_target = match key {
            OpportunityKey::Number => "number",
            OpportunityKey::OpportunityId => "opportunity_id",
        };

        let query = format!(
            r"
            INSERT INTO opportunities (
                opportunity_id, number, account_id, account_name, amount, closed_at,
                expected_revenue, is_closed, opportunity_name, owner_email, owner_id,
                owner_name, owner_title, stage, type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT ({conflict_target}) DO UPDATE SET
                opportunity_id = EXCLUDED.opportunity_id,
                number = EXCLUDED.number,
                account_id = EXCLUDED.account_id,
                account_name = EXCLUDED.account_name,
                amount = EXCLUDED.amount,
                closed_at = EXCLUDED.closed_at,
                expected_revenue = EXCLUDED.expected_revenue,
                is_closed = EXCLUDED.is_closed,
                opportunity_name = EXCLUDED.opportunity_name,
                owner_email = EXCLUDED.owner_email,
                owner_id = EXCLUDED.owner_id,
                owner_name = EXCLUDED.owner_name,
                owner_title = EXCLUDED.owner_title,
                stage = EXCLUDED.stage,
                type = EXCLUDED.type,
                updated_at = NOW()
            RETURNING id
            "
        );

        sqlx::query_scalar(&query)
            .bind(&fields.opportunity_id)
            .bind(&fields.number)
            .bind(&fields.account_id)
            .bind(&fields.account_name)
            .bind(fields.amount)
            .bind(fields.closed_at)
            .bind(fields.expected_revenue)
            .bind(fields.is_closed)
            .bind(&fields.opportunity_name)
            .bind(&fields.owner_email)
            .bind(&fields.owner_id)
            .bind(&fields.owner_name)
            .bind(&fields.owner_title)
            .bind(&fields.stage)
            .bind(&fields.opportunity_type)
            .fetch_one(pool)
            .await
    }

    /// Overwrite the non-key fields of row `id`, filling in a missing key.
    async fn update_fields(
        pool: &sqlx::PgPool,
        id: i32,
        fields: &OpportunityFields,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            r"
            UPDATE opportunities SET
                opportunity_id = COALESCE(opportunity_id, $2),
                number = COALESCE(number, $3),
                account_id = $4,
                account_name = $5,
                amount = $6,
                closed_at = $7,
                expected_revenue = $8,
                is_closed = $9,
                opportunity_name = $10,
                owner_email = $11,
                owner_id = $12,
                owner_name = $13,
                owner_title = $14,
                stage = $15,
                type = $16,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(&fields.opportunity_id)
        .bind(&fields.number)
        .bind(&fields.account_id)
        .bind(&fields.account_name)
        .bind(fields.amount)
        .bind(fields.closed_at)
        .bind(fields.expected_revenue)
        .bind(fields.is_closed)
        .bind(&fields.opportunity_name)
        .bind(&fields.owner_email)
        .bind(&fields.owner_id)
        .bind(&fields.owner_name)
        .bind(&fields.owner_title)
        .bind(&fields.stage)
        .bind(&fields.opportunity_type)
        .fetch_one(pool)
        .await
    }

    /// Find the opportunity holding either natural key, oldest first.
    pub async fn find_by_keys(
        pool: &sqlx::PgPool,
        opportunity_id: &str,
        number: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM opportunities
            WHERE opportunity_id = $1 OR number = $2
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(opportunity_id)
        .bind(number)
        .fetch_optional(pool)
        .await
    }
}
