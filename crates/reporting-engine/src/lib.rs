//! # Provision Reporting Engine
//!
//! Reconciles resource lifecycle events into the reporting ledger.
//!
//! A [`Dispatcher`] receives watch events. Namespace and claim events feed
//! the [`WatchCache`]; subject events are routed by lifecycle state. The
//! first tracked event for a resource materializes its provision row, with
//! catalog item, student, manager and opportunity dimensions resolved from
//! the account directory, the corporate directory and the CRM. Every state
//! change is appended to the lifecycle log unless it repeats the last one.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reporting_engine::{Dispatcher, EngineConfig, InMemoryLedgerStore, WatchCache};
//!
//! let dispatcher = Dispatcher::new(
//!     EngineConfig::default(),
//!     Arc::new(InMemoryLedgerStore::new()),
//!     Arc::new(WatchCache::new()),
//!     accounts,
//!     directory,
//!     Some(crm),
//! );
//! let outcome = dispatcher.handle_watch_event(event).await;
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod facts;
pub mod lifecycle;
pub mod opportunities;
pub mod provision;
pub mod store;
pub mod users;

pub use cache::WatchCache;
pub use config::{ApiDomains, EngineConfig, EnrichmentPolicy};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{EngineError, EngineResult};
pub use event::{AnarchySubject, ChangeType, ResourceEvent, ResourceState, WatchEvent};
pub use store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};
