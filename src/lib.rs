//! Distributed mutual exclusion over a Redis-compatible lease store.
//!
//! `runlock` lets a caller hold an exclusive lease over a named set of
//! resources for the duration of a critical section. The lease is renewed
//! automatically while the section runs and released on every exit path;
//! if the lease cannot be obtained within the retry budget the caller gets
//! a typed timeout error carrying attempt and wait-time diagnostics.
//!
//! The building blocks, leaves first:
//!
//! - [`retry`]: pure backoff computation (exponential, clamped, jittered)
//!   plus the cumulative wait-time budget.
//! - [`redlock`]: single-store lease primitives: atomic create-if-absent
//!   with TTL, token-guarded delete, token-guarded TTL extension.
//! - [`context`]: task-local reentrancy state, so nested acquisitions of
//!   the same resources bypass the store entirely.
//! - [`RunLocker`]: the façade that ties the above together.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use runlock::{LockerConfig, MemoryLeaseStore, RunLocker};
//!
//! let locker = RunLocker::new(Arc::new(MemoryLeaseStore::new()), LockerConfig::default())?;
//!
//! let value = locker
//!     .lock("runs", &["run_1234"], || async {
//!         // exclusive access to run_1234 in here
//!         42
//!     })
//!     .await?;
//! assert_eq!(value, 42);
//! ```
//!
//! Storage is abstracted behind the [`LeaseStore`] trait: production
//! deployments use [`RedisLeaseStore`] over a caller-supplied connection,
//! tests use the deterministic [`MemoryLeaseStore`].

#![warn(missing_docs)]

/// Coordinator and retry configuration.
pub mod config;
/// Task-local reentrancy context.
pub mod context;
/// Error types surfaced by the coordinator.
pub mod error;
/// Single-store lease client primitives.
pub mod redlock;
/// Backoff and wait-budget computation.
pub mod retry;
/// Lease store trait and implementations.
pub mod store;

mod locker;
mod resources;

pub use config::LockerConfig;
pub use config::RetryConfig;
pub use context::current_resources;
pub use context::is_inside_lock;
pub use error::LockError;
pub use locker::RunLocker;
pub use store::LeaseStore;
pub use store::LeaseStoreError;
pub use store::MemoryLeaseStore;
pub use store::RedisLeaseStore;
