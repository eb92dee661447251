//! In-memory ledger.
//!
//! All state sits behind one lock, so every operation is atomic with respect
//! to the others. Rows use the same types the Postgres models return.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reporting_db::models::{
    CatalogItem, LifecycleLogEntry, Manager, ManagerChargeback, NewCatalogItem, NewProvision,
    Opportunity, OpportunityFields, OpportunityKey, Provision, Student, StudentProfile,
    RESULT_FAILURE,
};
use tokio::sync::RwLock;

use super::{LedgerStore, ManagerRef, StoreResult};

#[derive(Debug, Default)]
struct State {
    catalog_items: Vec<CatalogItem>,
    students: Vec<Student>,
    managers: Vec<Manager>,
    chargeback: Vec<ManagerChargeback>,
    opportunities: Vec<Opportunity>,
    provisions: Vec<Provision>,
    lifecycle: Vec<LifecycleLogEntry>,
}

impl State {
    fn latest_operation(&self, uuid: &str) -> Option<&str> {
        self.lifecycle
            .iter()
            .rev()
            .find(|e| e.provision_uuid == uuid)
            .map(|e| e.operation.as_str())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a billable manager; returns its id.
    pub async fn add_chargeback_manager(&self, email: &str) -> i32 {
        let mut state = self.state.write().await;
        let id = next_id(state.chargeback.len());
        state.chargeback.push(ManagerChargeback {
            id,
            email: email.to_string(),
        });
        id
    }

    pub async fn catalog_items(&self) -> Vec<CatalogItem> {
        self.state.read().await.catalog_items.clone()
    }

    pub async fn students(&self) -> Vec<Student> {
        self.state.read().await.students.clone()
    }

    pub async fn managers(&self) -> Vec<Manager> {
        self.state.read().await.managers.clone()
    }

    pub async fn opportunities(&self) -> Vec<Opportunity> {
        self.state.read().await.opportunities.clone()
    }

    pub async fn provisions(&self) -> Vec<Provision> {
        self.state.read().await.provisions.clone()
    }

    pub async fn provision(&self, uuid: &str) -> Option<Provision> {
        self.state
            .read()
            .await
            .provisions
            .iter()
            .find(|p| p.uuid == uuid)
            .cloned()
    }

    /// Lifecycle entries for the uuid, oldest first.
    pub async fn lifecycle(&self, uuid: &str) -> Vec<LifecycleLogEntry> {
        self.state
            .read()
            .await
            .lifecycle
            .iter()
            .filter(|e| e.provision_uuid == uuid)
            .cloned()
            .collect()
    }
}

fn next_id(len: usize) -> i32 {
    i32::try_from(len + 1).unwrap_or(i32::MAX)
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn latest_operation(&self, uuid: &str) -> StoreResult<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .latest_operation(uuid)
            .map(str::to_string))
    }

    async fn append_lifecycle(
        &self,
        uuid: &str,
        operation: &str,
        executor: Option<&str>,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.latest_operation(uuid) == Some(operation) {
            return Ok(false);
        }
        let id = i64::from(next_id(state.lifecycle.len()));
        state.lifecycle.push(LifecycleLogEntry {
            id,
            provision_uuid: uuid.to_string(),
            logged_at: Utc::now(),
            operation: operation.to_string(),
            executor: executor.map(str::to_string),
        });
        Ok(true)
    }

    async fn insert_or_get_catalog_item(&self, item: &NewCatalogItem) -> StoreResult<i32> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .catalog_items
            .iter()
            .find(|c| c.catalog_item == item.catalog_item)
        {
            return Ok(existing.id);
        }
        let id = next_id(state.catalog_items.len());
        state.catalog_items.push(CatalogItem {
            id,
            catalog_item: item.catalog_item.clone(),
            catalog_name: item.catalog_name.clone(),
            class_name: item.class_name.clone(),
            infra_type: item.infra_type.as_str().to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn upsert_student(&self, profile: &StudentProfile) -> StoreResult<i32> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        if let Some(existing) = state.students.iter_mut().find(|s| s.email == profile.email) {
            existing.geo = profile.geo.clone();
            existing.partner = profile.partner.clone();
            existing.cost_center = profile.cost_center.clone();
            existing.manager = profile.manager.clone();
            existing.manager_email = profile.manager_email.clone();
            existing.title = profile.title.clone();
            existing.updated_at = now;
            return Ok(existing.id);
        }
        let id = next_id(state.students.len());
        state.students.push(Student {
            id,
            email: profile.email.clone(),
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            geo: profile.geo.clone(),
            partner: profile.partner.clone(),
            cost_center: profile.cost_center.clone(),
            kerberos_id: profile.kerberos_id.clone(),
            manager: profile.manager.clone(),
            manager_email: profile.manager_email.clone(),
            title: profile.title.clone(),
            check_headcount: profile.check_headcount,
            company_id: profile.company_id,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn insert_or_get_manager(&self, manager: &ManagerRef) -> StoreResult<i32> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.managers.iter().find(|m| m.email == manager.email) {
            return Ok(existing.id);
        }
        let id = next_id(state.managers.len());
        state.managers.push(Manager {
            id,
            email: manager.email.clone(),
            name: manager.name.clone(),
            kerberos_id: manager.kerberos_id.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn chargeback_managers(&self) -> StoreResult<HashMap<String, i32>> {
        Ok(self
            .state
            .read()
            .await
            .chargeback
            .iter()
            .map(|m| (m.email.to_lowercase(), m.id))
            .collect())
    }

    async fn upsert_opportunity(
        &self,
        fields: &OpportunityFields,
        key: OpportunityKey,
    ) -> StoreResult<i32> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let matches = |o: &Opportunity| match key {
            OpportunityKey::Number => fields.number.is_some() && o.number == fields.number,
            OpportunityKey::OpportunityId => {
                o.opportunity_id.as_deref() == Some(fields.opportunity_id.as_str())
            }
        };
        let holds_either = |o: &Opportunity| {
            o.opportunity_id.as_deref() == Some(fields.opportunity_id.as_str())
                || (fields.number.is_some() && o.number == fields.number)
        };

        let mut opportunity_id = Some(fields.opportunity_id.clone());
        let mut number = fields.number.clone();
        let (id, created_at) = if let Some(index) = state.opportunities.iter().position(matches) {
            let row = state.opportunities.remove(index);
            (row.id, row.created_at)
        } else if let Some(index) = state.opportunities.iter().position(holds_either) {
            // Stored under the other key: keep its keys, fill in a missing one.
            let row = state.opportunities.remove(index);
            opportunity_id = row.opportunity_id.or(opportunity_id);
            number = row.number.or(number);
            (row.id, row.created_at)
        } else {
            (next_id(state.opportunities.len()), now)
        };

        state.opportunities.push(Opportunity {
            id,
            opportunity_id,
            number,
            account_id: fields.account_id.clone(),
            account_name: fields.account_name.clone(),
            amount: fields.amount,
            closed_at: fields.closed_at,
            expected_revenue: fields.expected_revenue,
            is_closed: fields.is_closed,
            opportunity_name: fields.opportunity_name.clone(),
            owner_email: fields.owner_email.clone(),
            owner_id: fields.owner_id.clone(),
            owner_name: fields.owner_name.clone(),
            owner_title: fields.owner_title.clone(),
            stage: fields.stage.clone(),
            opportunity_type: fields.opportunity_type.clone(),
            created_at,
            updated_at: now,
        });
        state.opportunities.sort_by_key(|o| o.id);
        Ok(id)
    }

    async fn provision_exists(&self, uuid: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .provisions
            .iter()
            .any(|p| p.uuid == uuid))
    }

    async fn insert_provision(&self, new: &NewProvision) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.provisions.iter().any(|p| p.uuid == new.uuid) {
            return Ok(false);
        }
        let now = Utc::now();
        let id = next_id(state.provisions.len());
        state.provisions.push(Provision {
            id,
            uuid: new.uuid.clone(),
            catalog_id: new.catalog_id,
            student_id: new.student_id,
            manager_id: new.manager_id,
            manager_chargeback_id: new.manager_chargeback_id,
            opportunity_id: new.opportunity_id,
            provisioned_at: new.provisioned_at,
            workshop_users: new.workshop_users,
            service_type: new.service_type.clone(),
            account: new.account.clone(),
            sandbox_name: new.sandbox_name.clone(),
            provision_result: new.provision_result.clone(),
            cloud: new.cloud.clone(),
            cloud_region: new.cloud_region.clone(),
            environment: new.environment.clone(),
            class_name: new.class_name.clone(),
            chargeback_method: new.chargeback_method.clone(),
            purpose: new.purpose.clone(),
            datasource: new.datasource.clone(),
            babylon_guid: new.babylon_guid.clone(),
            cost_center: new.cost_center.clone(),
            student_geo: new.student_geo.clone(),
            retired_at: None,
            created_at: now,
            updated_at: now,
        });
        Ok(true)
    }

    async fn mark_provision_failed(&self, uuid: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.provisions.iter_mut().find(|p| p.uuid == uuid) {
            Some(row) => {
                row.provision_result = RESULT_FAILURE.to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn retire_provision(&self, uuid: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state
            .provisions
            .iter_mut()
            .find(|p| p.uuid == uuid && p.retired_at.is_none())
        {
            Some(row) => {
                row.retired_at = Some(at);
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reporting_db::models::InfraType;

    #[tokio::test]
    async fn test_append_skips_repeat_of_latest() {
        let store = InMemoryLedgerStore::new();
        assert!(store.append_lifecycle("u1", "started", None).await.unwrap());
        assert!(!store.append_lifecycle("u1", "started", None).await.unwrap());
        assert!(store.append_lifecycle("u2", "started", None).await.unwrap());
        assert!(store.append_lifecycle("u1", "stopped", None).await.unwrap());
        assert!(store.append_lifecycle("u1", "started", None).await.unwrap());

        let ops: Vec<String> = store
            .lifecycle("u1")
            .await
            .into_iter()
            .map(|e| e.operation)
            .collect();
        assert_eq!(ops, vec!["started", "stopped", "started"]);
    }

    #[tokio::test]
    async fn test_catalog_item_first_write_wins() {
        let store = InMemoryLedgerStore::new();
        let item = NewCatalogItem {
            catalog_item: "gpte.dev.env1".into(),
            catalog_name: Some("Env One".into()),
            class_name: None,
            infra_type: InfraType::Dedicated,
        };
        let id = store.insert_or_get_catalog_item(&item).await.unwrap();
        let again = store
            .insert_or_get_catalog_item(&NewCatalogItem {
                catalog_name: Some("Renamed".into()),
                ..item
            })
            .await
            .unwrap();
        assert_eq!(id, again);

        let rows = store.catalog_items().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].catalog_name.as_deref(), Some("Env One"));
    }

    #[tokio::test]
    async fn test_opportunity_update_keeps_id() {
        let store = InMemoryLedgerStore::new();
        let fields = OpportunityFields {
            opportunity_id: "006A".into(),
            number: Some("123".into()),
            stage: Some("Qualify".into()),
            ..Default::default()
        };
        let id = store
            .upsert_opportunity(&fields, OpportunityKey::Number)
            .await
            .unwrap();
        let again = store
            .upsert_opportunity(
                &OpportunityFields {
                    stage: Some("Closed Won".into()),
                    ..fields
                },
                OpportunityKey::OpportunityId,
            )
            .await
            .unwrap();
        assert_eq!(id, again);

        let rows = store.opportunities().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stage.as_deref(), Some("Closed Won"));
    }

    #[tokio::test]
    async fn test_opportunity_matched_by_the_other_key() {
        let store = InMemoryLedgerStore::new();
        let id = store
            .upsert_opportunity(
                &OpportunityFields {
                    opportunity_id: "006B".into(),
                    ..Default::default()
                },
                OpportunityKey::OpportunityId,
            )
            .await
            .unwrap();
        let again = store
            .upsert_opportunity(
                &OpportunityFields {
                    opportunity_id: "006B".into(),
                    number: Some("456".into()),
                    ..Default::default()
                },
                OpportunityKey::Number,
            )
            .await
            .unwrap();
        assert_eq!(id, again);

        let rows = store.opportunities().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].number.as_deref(), Some("456"));
    }

    #[tokio::test]
    async fn test_retire_is_one_shot() {
        let store = InMemoryLedgerStore::new();
        assert!(!store.retire_provision("missing", Utc::now()).await.unwrap());
        assert!(!store.mark_provision_failed("missing").await.unwrap());
    }
}
