//! De-duplicated lifecycle trail per provision.

use std::sync::Arc;

use tracing::debug;

use crate::error::EngineResult;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct LifecycleLog {
    store: Arc<dyn LedgerStore>,
}

impl LifecycleLog {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Record `operation` unless it repeats the latest entry for the uuid.
    pub async fn append(
        &self,
        uuid: &str,
        operation: &str,
        executor: Option<&str>,
    ) -> EngineResult<bool> {
        let appended = self.store.append_lifecycle(uuid, operation, executor).await?;
        if appended {
            debug!(uuid, operation, executor, "Lifecycle transition logged");
        } else {
            debug!(uuid, operation, "Lifecycle transition unchanged");
        }
        Ok(appended)
    }

    pub async fn latest(&self, uuid: &str) -> EngineResult<Option<String>> {
        Ok(self.store.latest_operation(uuid).await?)
    }
}
