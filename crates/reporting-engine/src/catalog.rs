//! Catalog item dimension.

use std::sync::Arc;

use reporting_db::models::{InfraType, NewCatalogItem};
use tracing::debug;

use crate::error::EngineResult;
use crate::facts::ProvisionFacts;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct CatalogRegistry {
    store: Arc<dyn LedgerStore>,
}

impl CatalogRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Id of the catalog item, created on first sighting.
    pub async fn ensure(&self, facts: &ProvisionFacts) -> EngineResult<i32> {
        let item = catalog_item_for(facts);
        let id = self.store.insert_or_get_catalog_item(&item).await?;
        debug!(
            catalog_item = %item.catalog_item,
            infra_type = %item.infra_type,
            id,
            "Catalog item resolved"
        );
        Ok(id)
    }
}

pub fn catalog_item_for(facts: &ProvisionFacts) -> NewCatalogItem {
    NewCatalogItem {
        catalog_item: facts.catalog_item.clone(),
        catalog_name: Some(facts.catalog_name.trim().to_string()),
        class_name: Some(facts.class_name.clone()),
        infra_type: InfraType::classify(&facts.class_name, &facts.account),
    }
}
