//! Ledger persistence.
//!
//! [`LedgerStore`] is everything the engine writes or reads. The Postgres
//! backend is used in production; the in-memory backend backs tests and
//! dry runs.

mod memory;
mod postgres;

pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reporting_db::models::{
    NewCatalogItem, NewProvision, OpportunityFields, OpportunityKey, StudentProfile,
};
use reporting_db::DbError;

/// Result alias for store calls.
pub type StoreResult<T> = Result<T, DbError>;

/// A manager row to insert if absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerRef {
    pub email: String,
    pub name: Option<String>,
    pub kerberos_id: Option<String>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Latest operation logged for the uuid.
    async fn latest_operation(&self, uuid: &str) -> StoreResult<Option<String>>;

    /// Append the operation unless it repeats the latest one.
    async fn append_lifecycle(
        &self,
        uuid: &str,
        operation: &str,
        executor: Option<&str>,
    ) -> StoreResult<bool>;

    /// Insert the catalog item unless present; return its id.
    async fn insert_or_get_catalog_item(&self, item: &NewCatalogItem) -> StoreResult<i32>;

    /// Insert or refresh the student; return its id.
    async fn upsert_student(&self, profile: &StudentProfile) -> StoreResult<i32>;

    /// Insert the manager unless present; return its id.
    async fn insert_or_get_manager(&self, manager: &ManagerRef) -> StoreResult<i32>;

    /// Billable managers, keyed by lower-cased email.
    async fn chargeback_managers(&self) -> StoreResult<HashMap<String, i32>>;

    /// Insert or overwrite the opportunity matched by `key`; return its id.
    async fn upsert_opportunity(
        &self,
        fields: &OpportunityFields,
        key: OpportunityKey,
    ) -> StoreResult<i32>;

    async fn provision_exists(&self, uuid: &str) -> StoreResult<bool>;

    /// Insert the provision unless its uuid exists. Returns whether it was written.
    async fn insert_provision(&self, provision: &NewProvision) -> StoreResult<bool>;

    /// Set the result to failure. Returns false when no provision exists.
    async fn mark_provision_failed(&self, uuid: &str) -> StoreResult<bool>;

    /// Stamp `retired_at` once. Returns false when missing or already retired.
    async fn retire_provision(&self, uuid: &str, at: DateTime<Utc>) -> StoreResult<bool>;
}
