//! Reporting Core Library
//!
//! Shared primitives for the provision reporting workspace.
//!
//! # Modules
//!
//! - [`resilience`] - Bounded exponential-backoff retry for external calls
//!
//! # Example
//!
//! ```
//! use reporting_core::{RetryConfig, RetryExecutor};
//!
//! let executor = RetryExecutor::new(RetryConfig::default());
//! assert_eq!(executor.config().max_attempts, 3);
//! ```

pub mod resilience;

pub use resilience::{RetryConfig, RetryExecutor, Transient};
