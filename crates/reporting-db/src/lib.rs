//! # Provision Reporting Database
//!
//! PostgreSQL persistence for the reporting schema: catalog items, students,
//! managers, opportunities, provisions and the lifecycle log.
//!
//! Every dimension write is a single statement backed by a unique constraint
//! on the natural key, so concurrent deliveries of the same event converge on
//! one row.
//!
//! ```rust,ignore
//! use reporting_db::{DbPool, run_migrations};
//!
//! let pool = DbPool::connect("postgres://localhost/reporting").await?;
//! run_migrations(&pool).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{DbPool, PoolOptions};
