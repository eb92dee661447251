//! # Salesforce Opportunity Adapter
//!
//! [`SalesforceCrm`] implements `CrmSource` over the Salesforce REST API.
//! Sessions are obtained with the OAuth 2.0 JWT bearer flow (or a fixed
//! access token), established lazily with retry and reused until the API
//! answers `401`.

pub mod config;
pub mod connector;
pub mod soql;

pub use config::{CrmAuth, CrmConfig};
pub use connector::SalesforceCrm;
