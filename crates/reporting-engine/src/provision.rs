//! One-time materialization of the provision fact row.

use std::sync::Arc;

use reporting_connector::directory::AccountSource;
use reporting_db::models::NewProvision;
use tracing::{debug, info, instrument};

use crate::catalog::CatalogRegistry;
use crate::error::{EngineError, EngineResult};
use crate::facts::ProvisionFacts;
use crate::opportunities::OpportunityResolver;
use crate::store::LedgerStore;
use crate::users::UserEnricher;

pub const SERVICE_TYPE: &str = "babylon";
pub const DATASOURCE: &str = "RHDPS";

/// Writes the provision row and the dimension rows it references.
#[derive(Clone)]
pub struct ProvisionWriter {
    store: Arc<dyn LedgerStore>,
    accounts: Arc<dyn AccountSource>,
    catalog: CatalogRegistry,
    users: UserEnricher,
    opportunities: OpportunityResolver,
}

impl ProvisionWriter {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        accounts: Arc<dyn AccountSource>,
        users: UserEnricher,
        opportunities: OpportunityResolver,
    ) -> Self {
        Self {
            catalog: CatalogRegistry::new(store.clone()),
            store,
            accounts,
            users,
            opportunities,
        }
    }

    /// Materialize the provision unless one exists for the uuid.
    ///
    /// Returns whether this call wrote the row.
    #[instrument(skip(self, facts), fields(uuid = %facts.uuid, state = %facts.current_state))]
    pub async fn ensure(&self, facts: &ProvisionFacts) -> EngineResult<bool> {
        if self.store.provision_exists(&facts.uuid).await? {
            debug!("Provision already recorded");
            return Ok(false);
        }

        let username = facts
            .username
            .as_deref()
            .ok_or_else(|| EngineError::invalid("requester username unknown"))?;
        let account = self
            .accounts
            .find_account(username)
            .await?
            .ok_or_else(|| EngineError::invalid(format!("no account for requester {username}")))?;

        let catalog_id = self.catalog.ensure(facts).await?;

        let chargeback_set = self.store.chargeback_managers().await?;
        let user = self.users.enrich(&account, &chargeback_set).await?;
        let student_id = self.store.upsert_student(&user.profile).await?;
        let manager_id = match &user.manager {
            Some(manager) => Some(self.store.insert_or_get_manager(manager).await?),
            None => None,
        };

        let opportunity_id = match &facts.opportunity {
            Some(reference) => self.opportunities.resolve(reference).await?,
            None => None,
        };

        let row = NewProvision {
            uuid: facts.uuid.clone(),
            catalog_id,
            student_id,
            manager_id,
            manager_chargeback_id: user.chargeback_manager_id,
            opportunity_id,
            provisioned_at: facts.provisioned_at,
            workshop_users: facts.workshop_users,
            service_type: SERVICE_TYPE.to_string(),
            account: facts.account.clone(),
            sandbox_name: facts.sandbox_name.clone(),
            provision_result: facts.provision_result().to_string(),
            cloud: facts.cloud.clone(),
            cloud_region: facts.cloud_region.clone(),
            environment: facts.environment.clone(),
            class_name: Some(facts.class_name.clone()),
            chargeback_method: facts.chargeback_method.clone(),
            purpose: facts.purpose.clone(),
            datasource: DATASOURCE.to_string(),
            babylon_guid: facts.babylon_guid.clone(),
            cost_center: user.profile.cost_center.clone(),
            student_geo: Some(account.region.clone()),
        };

        let written = self.store.insert_provision(&row).await?;
        if written {
            info!(
                catalog_id,
                student_id,
                email = %user.profile.email,
                result = %row.provision_result,
                "Provision recorded"
            );
        } else {
            debug!("Provision recorded concurrently");
        }
        Ok(written)
    }
}
