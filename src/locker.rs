//! Lock coordinator.
//!
//! [`RunLocker`] orchestrates the full acquisition lifecycle: reentrancy
//! short-circuit, retry-driven acquisition against the store, a periodic
//! auto-extension task for the held lease, the caller's critical section
//! under a reentrancy frame, and release on every exit path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use snafu::ResultExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::config::LockerConfig;
use crate::config::RetryConfig;
use crate::context;
use crate::error::AcquisitionTimeoutSnafu;
use crate::error::LockError;
use crate::error::StoreSnafu;
use crate::redlock;
use crate::redlock::AcquireOutcome;
use crate::redlock::ExtendOutcome;
use crate::redlock::RedlockClient;
use crate::resources;
use crate::retry;
use crate::store::LeaseStore;

/// Distributed mutual exclusion over named resource sets.
///
/// A `RunLocker` leases `(name, resource)` keys in the coordination store
/// for the duration of a caller's critical section. Acquisitions of the
/// same canonical resource set from inside an already-held critical
/// section run their body directly; everything else competes through the
/// store, bounded by the configured retry budget.
///
/// Cloning is cheap and clones share the shutdown signal:
/// [`quit`](RunLocker::quit) on any clone stops every outstanding
/// extension task.
pub struct RunLocker<S: LeaseStore + ?Sized> {
    client: RedlockClient<S>,
    config: LockerConfig,
    shutdown: CancellationToken,
}

impl<S: LeaseStore + ?Sized> Clone for RunLocker<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S: LeaseStore + ?Sized + 'static> RunLocker<S> {
    /// Create a coordinator over a caller-supplied store.
    ///
    /// Rejects unusable configurations (zero duration, an extension
    /// threshold at or beyond the lease duration, a shrinking backoff
    /// multiplier, jitter outside `[0, 1]`).
    pub fn new(store: Arc<S>, config: LockerConfig) -> Result<Self, LockError> {
        config.validate()?;
        Ok(Self {
            client: RedlockClient::new(store),
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Acquire `(name, resources)`, run `body` inside the held lease,
    /// release, and return the body's output.
    ///
    /// The body's output, including a body-level `Result::Err`, is
    /// returned verbatim inside `Ok` after release; release problems never
    /// mask it. `Err` here means the lease itself could not be obtained:
    /// [`LockError::AcquisitionTimeout`] once the retry budget is
    /// exhausted, or a store failure during acquisition.
    ///
    /// If this future is dropped while waiting, no lease is held. If it is
    /// dropped (or the body panics) while the lease is held, the extension
    /// task is stopped synchronously and the lease released best-effort in
    /// a background task; TTL expiry covers the remaining failure modes.
    pub async fn lock<R, F, Fut, T>(&self, name: &str, resources: &[R], body: F) -> Result<T, LockError>
    where
        R: AsRef<str>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let members = resources::canonical_members(resources)?;
        let canonical = resources::canonical_form(&members);

        // Reentrancy short-circuit: the frame already names these
        // resources, so the enclosing call holds the lease.
        if context::current_resources().as_deref() == Some(canonical.as_str()) {
            debug!(resources = %canonical, "reentrant acquisition, running body inline");
            return Ok(body().await);
        }

        let keys = resources::lease_keys(name, &members);
        let token = self.acquire(&canonical, &keys).await?;
        let extension = self.spawn_extension_task(&keys, &token);
        let guard = AcquisitionGuard {
            client: self.client.clone(),
            keys,
            token,
            extension,
            released: false,
        };

        let output = context::with_frame(canonical, body()).await;

        guard.release().await;
        Ok(output)
    }

    /// Like [`lock`](RunLocker::lock) when `condition` holds; otherwise
    /// runs `body` directly with no lease and no reentrancy frame.
    pub async fn lock_if<R, F, Fut, T>(
        &self,
        condition: bool,
        name: &str,
        resources: &[R],
        body: F,
    ) -> Result<T, LockError>
    where
        R: AsRef<str>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if condition {
            self.lock(name, resources, body).await
        } else {
            Ok(body().await)
        }
    }

    /// Whether the current task is running inside a held lock.
    pub fn is_inside_lock(&self) -> bool {
        context::is_inside_lock()
    }

    /// Canonical resource form held by the innermost enclosing lock, if any.
    pub fn current_resources(&self) -> Option<String> {
        context::current_resources()
    }

    /// Lease TTL per grant.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.config.duration_ms)
    }

    /// Refresh lead-time before lease expiry.
    pub fn automatic_extension_threshold(&self) -> Duration {
        Duration::from_millis(self.config.automatic_extension_threshold_ms)
    }

    /// Retry behavior used during acquisition.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.config.retry
    }

    /// Stop every outstanding extension task and shut the coordinator
    /// down. Dropping the coordinator (and its clones) afterwards releases
    /// the underlying store handle.
    pub fn quit(self) {
        self.shutdown.cancel();
    }

    /// The acquisition loop: fresh token per attempt, backoff between
    /// attempts, bounded by both the attempt count and the cumulative
    /// wait-time budget.
    async fn acquire(&self, canonical: &str, keys: &[String]) -> Result<String, LockError> {
        let ttl = Duration::from_millis(self.config.duration_ms);
        let retry_config = &self.config.retry;
        let budget = Duration::from_millis(retry_config.max_total_wait_time_ms);
        let mut attempts: u32 = 0;
        let mut total_waited = Duration::ZERO;

        loop {
            attempts += 1;
            let token = redlock::generate_token();
            let outcome = self.client.try_acquire(keys, &token, ttl).await.context(StoreSnafu)?;
            match outcome {
                AcquireOutcome::Acquired => {
                    debug!(resources = %canonical, attempts, "lock acquired");
                    return Ok(token);
                }
                AcquireOutcome::Unavailable => {
                    if attempts > retry_config.max_attempts || !retry::budget_remaining(retry_config, total_waited) {
                        warn!(
                            resources = %canonical,
                            attempts,
                            waited_ms = total_waited.as_millis() as u64,
                            "lock acquisition budget exhausted"
                        );
                        return AcquisitionTimeoutSnafu {
                            resources: canonical,
                            attempts,
                            total_wait_time_ms: total_waited.as_millis() as u64,
                        }
                        .fail();
                    }

                    let delay = retry::compute_delay(retry_config, attempts - 1)
                        .min(budget.saturating_sub(total_waited));
                    debug!(
                        resources = %canonical,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "resources held, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    total_waited += delay;
                }
            }
        }
    }

    /// Spawn the periodic lease refresh for a fresh grant. Returns the
    /// token that cancels it; the token is also a child of the
    /// coordinator-wide shutdown signal.
    fn spawn_extension_task(&self, keys: &[String], token: &str) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        let client = self.client.clone();
        let keys = keys.to_vec();
        let token = token.to_string();
        let ttl = Duration::from_millis(self.config.duration_ms);
        let period = Duration::from_millis(self.config.duration_ms - self.config.automatic_extension_threshold_ms);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run_extension_loop(client, keys, token, ttl, period, task_cancel).await;
        });
        cancel
    }
}

/// Refresh the lease every `period` until cancelled or lost.
async fn run_extension_loop<S: LeaseStore + ?Sized>(
    client: RedlockClient<S>,
    keys: Vec<String>,
    token: String,
    ttl: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(keys = keys.len(), "extension task stopped");
                break;
            }
            _ = ticker.tick() => {}
        }

        // The round-trip is guarded too: once cancellation is observed no
        // refresh reaches the store.
        tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = client.extend(&keys, &token, ttl) => match outcome {
                ExtendOutcome::Extended => debug!(keys = keys.len(), "lease extended"),
                ExtendOutcome::Lost => break,
            }
        }
    }
}

/// Held-lease state for one acquisition. Ensures the extension task is
/// cancelled before the lease keys are released, on every exit path.
struct AcquisitionGuard<S: LeaseStore + ?Sized + 'static> {
    client: RedlockClient<S>,
    keys: Vec<String>,
    token: String,
    extension: CancellationToken,
    released: bool,
}

impl<S: LeaseStore + ?Sized + 'static> AcquisitionGuard<S> {
    async fn release(mut self) {
        self.extension.cancel();
        // Marked before the round-trip: if release itself is interrupted,
        // the remaining keys expire via TTL rather than being released a
        // second time from Drop.
        self.released = true;
        self.client.release(&self.keys, &self.token).await;
    }
}

impl<S: LeaseStore + ?Sized + 'static> Drop for AcquisitionGuard<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Reached on body panic or caller cancellation. Cancellation of
        // the extension task is synchronous; the release itself cannot be
        // awaited here, so it runs best-effort off-task.
        self.extension.cancel();
        let client = self.client.clone();
        let keys = std::mem::take(&mut self.keys);
        let token = std::mem::take(&mut self.token);
        tokio::spawn(async move {
            client.release(&keys, &token).await;
        });
    }
}
