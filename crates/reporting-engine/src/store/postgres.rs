//! PostgreSQL-backed ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reporting_db::models::{
    CatalogItem, LifecycleLogEntry, Manager, ManagerChargeback, NewCatalogItem, NewProvision,
    Opportunity, OpportunityFields, OpportunityKey, Provision, Student, StudentProfile,
};
use reporting_db::DbPool;

use super::{LedgerStore, ManagerRef, StoreResult};

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn pg(&self) -> &sqlx::PgPool {
        self.pool.inner()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn latest_operation(&self, uuid: &str) -> StoreResult<Option<String>> {
        Ok(LifecycleLogEntry::latest_operation(self.pg(), uuid).await?)
    }

    async fn append_lifecycle(
        &self,
        uuid: &str,
        operation: &str,
        executor: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(LifecycleLogEntry::append_if_changed(self.pg(), uuid, operation, executor).await?)
    }

    async fn insert_or_get_catalog_item(&self, item: &NewCatalogItem) -> StoreResult<i32> {
        Ok(CatalogItem::insert_or_get(self.pg(), item).await?)
    }

    async fn upsert_student(&self, profile: &StudentProfile) -> StoreResult<i32> {
        Ok(Student::upsert(self.pg(), profile).await?)
    }

    async fn insert_or_get_manager(&self, manager: &ManagerRef) -> StoreResult<i32> {
        Ok(Manager::insert_or_get(
            self.pg(),
            &manager.email,
            manager.name.as_deref(),
            manager.kerberos_id.as_deref(),
        )
        .await?)
    }

    async fn chargeback_managers(&self) -> StoreResult<HashMap<String, i32>> {
        Ok(ManagerChargeback::list_all(self.pg())
            .await?
            .into_iter()
            .map(|m| (m.email.to_lowercase(), m.id))
            .collect())
    }

    async fn upsert_opportunity(
        &self,
        fields: &OpportunityFields,
        key: OpportunityKey,
    ) -> StoreResult<i32> {
        Ok(Opportunity::upsert(self.pg(), fields, key).await?)
    }

    async fn provision_exists(&self, uuid: &str) -> StoreResult<bool> {
        Ok(Provision::exists(self.pg(), uuid).await?)
    }

    async fn insert_provision(&self, provision: &NewProvision) -> StoreResult<bool> {
        Ok(Provision::insert(self.pg(), provision).await?)
    }

    async fn mark_provision_failed(&self, uuid: &str) -> StoreResult<bool> {
        Ok(Provision::mark_failed(self.pg(), uuid).await?)
    }

    async fn retire_provision(&self, uuid: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(Provision::retire(self.pg(), uuid, at).await?)
    }
}
