//! Row types and their queries.

pub mod catalog_item;
pub mod lifecycle_log;
pub mod manager;
pub mod opportunity;
pub mod provision;
pub mod student;

pub use catalog_item::{CatalogItem, InfraType, NewCatalogItem};
pub use lifecycle_log::LifecycleLogEntry;
pub use manager::{Manager, ManagerChargeback};
pub use opportunity::{Opportunity, OpportunityFields, OpportunityKey};
pub use provision::{NewProvision, Provision, RESULT_FAILURE, RESULT_SUCCESS};
pub use student::{Student, StudentProfile};
