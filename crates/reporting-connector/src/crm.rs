//! CRM opportunity records and lookup capability.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConnectorResult;

/// A sales opportunity with its owner and account resolved.
///
/// Every field the CRM may leave empty is optional; absent values are
/// written as SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    /// CRM record identifier.
    pub opportunity_id: String,
    /// Human-facing opportunity number.
    pub number: Option<String>,
    pub name: Option<String>,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub amount: Option<Decimal>,
    pub closed_at: Option<NaiveDate>,
    pub expected_revenue: Option<Decimal>,
    pub is_closed: Option<bool>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_title: Option<String>,
    pub stage: Option<String>,
    pub opportunity_type: Option<String>,
}

/// Capability for looking up opportunities in the CRM.
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Find an opportunity by its opportunity number.
    async fn opportunity_by_number(&self, number: &str)
        -> ConnectorResult<Option<OpportunityRecord>>;

    /// Find an opportunity by its CRM record identifier.
    async fn opportunity_by_id(&self, id: &str) -> ConnectorResult<Option<OpportunityRecord>>;
}
