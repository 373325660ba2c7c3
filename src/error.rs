//! Error types for the lock coordinator.

use snafu::Snafu;

use crate::store::LeaseStoreError;

/// Errors surfaced by [`RunLocker`](crate::RunLocker) operations.
///
/// Failures of the caller's critical section are never wrapped in this
/// type: the body's output is returned verbatim after release. Store
/// failures during release or extension are logged and absorbed (TTL
/// expiry keeps the lease state correct), so only acquisition-path
/// failures appear here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LockError {
    /// The retry budget was exhausted without obtaining the lease.
    #[snafu(display(
        "failed to acquire lock on [{resources}] after {attempts} attempts ({total_wait_time_ms}ms waited)"
    ))]
    AcquisitionTimeout {
        /// Canonical form of the contested resource set.
        resources: String,
        /// Number of acquisition attempts made, including the first.
        attempts: u32,
        /// Total time spent sleeping between attempts, in milliseconds.
        total_wait_time_ms: u64,
    },

    /// The coordinator was constructed with an unusable configuration.
    #[snafu(display("invalid locker configuration: {reason}"))]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// A lock was requested over an empty resource set.
    #[snafu(display("cannot lock an empty resource set"))]
    EmptyResources,

    /// The coordination store failed while acquiring the lease.
    #[snafu(display("lease store error during acquisition: {source}"))]
    Store {
        /// The underlying store error.
        source: LeaseStoreError,
    },
}
