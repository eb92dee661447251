//! Sales opportunity dimension.

use std::sync::Arc;

use reporting_connector::crm::{CrmSource, OpportunityRecord};
use reporting_db::models::{OpportunityFields, OpportunityKey};
use tracing::{debug, instrument, warn};

use crate::error::EngineResult;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct OpportunityResolver {
    crm: Option<Arc<dyn CrmSource>>,
    store: Arc<dyn LedgerStore>,
}

impl OpportunityResolver {
    pub fn new(crm: Option<Arc<dyn CrmSource>>, store: Arc<dyn LedgerStore>) -> Self {
        Self { crm, store }
    }

    /// Look the reference up by number, then by record id, and store what
    /// was found. Returns the row id.
    ///
    /// CRM failures are logged and treated as not found; a provision is
    /// recorded without its opportunity rather than not at all.
    #[instrument(skip(self))]
    pub async fn resolve(&self, reference: &str) -> EngineResult<Option<i32>> {
        let Some(crm) = &self.crm else {
            debug!("CRM not configured, skipping opportunity lookup");
            return Ok(None);
        };

        let found = match lookup(crm.as_ref(), reference).await {
            Ok(found) => found,
            Err(error) => {
                warn!(error = %error, "Opportunity lookup failed");
                return Ok(None);
            }
        };

        let Some((record, key)) = found else {
            debug!("Opportunity not found in CRM");
            return Ok(None);
        };

        let id = self
            .store
            .upsert_opportunity(&opportunity_fields(record), key)
            .await?;
        debug!(id, ?key, "Opportunity stored");
        Ok(Some(id))
    }
}

async fn lookup(
    crm: &dyn CrmSource,
    reference: &str,
) -> reporting_connector::error::ConnectorResult<Option<(OpportunityRecord, OpportunityKey)>> {
    if let Some(record) = crm.opportunity_by_number(reference).await? {
        return Ok(Some((record, OpportunityKey::Number)));
    }
    Ok(crm
        .opportunity_by_id(reference)
        .await?
        .map(|record| (record, OpportunityKey::OpportunityId)))
}

pub fn opportunity_fields(record: OpportunityRecord) -> OpportunityFields {
    OpportunityFields {
        opportunity_id: record.opportunity_id,
        number: record.number,
        account_id: record.account_id,
        account_name: record.account_name,
        amount: record.amount,
        closed_at: record.closed_at,
        expected_revenue: record.expected_revenue,
        is_closed: record.is_closed,
        opportunity_name: record.name,
        owner_email: record.owner_email,
        owner_id: record.owner_id,
        owner_name: record.owner_name,
        owner_title: record.owner_title,
        stage: record.stage,
        opportunity_type: record.opportunity_type,
    }
}
