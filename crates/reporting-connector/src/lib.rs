//! # Connector Contracts
//!
//! Lookup capabilities the reconciliation engine consumes from external
//! systems, and the record types they return.
//!
//! - [`DirectorySource`] - corporate directory person search
//! - [`AccountSource`] - requester account search (IPA)
//! - [`CrmSource`] - opportunity lookup
//!
//! Implementations live in `reporting-connector-ldap` and
//! `reporting-connector-crm`; tests substitute hand-written fakes.
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`directory`] - Directory records and traits
//! - [`crm`] - Opportunity records and trait

pub mod crm;
pub mod directory;
pub mod error;

/// Prelude module for convenient imports.
///
/// ```
/// use reporting_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::crm::{CrmSource, OpportunityRecord};
    pub use crate::directory::{
        dn_to_email, AccountEntry, AccountSource, DirectoryEntry, DirectorySource,
    };
    pub use crate::error::{ConnectorError, ConnectorResult};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
