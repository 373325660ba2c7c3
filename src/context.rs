//! Task-local reentrancy context.
//!
//! The coordinator records the canonical resource form of the innermost
//! held acquisition in task-local storage, so nested `lock` calls over the
//! same resources can run their body directly instead of deadlocking
//! against their own lease. The frame follows the logical task through
//! awaits and is popped on every exit path; tasks spawned from inside a
//! critical section do not inherit it.

use std::future::Future;

tokio::task_local! {
    static HELD_RESOURCES: String;
}

/// Whether the current task is running inside a held lock.
pub fn is_inside_lock() -> bool {
    HELD_RESOURCES.try_with(|_| ()).is_ok()
}

/// Canonical form of the resource set held by the innermost enclosing
/// `lock` call, if any.
pub fn current_resources() -> Option<String> {
    HELD_RESOURCES.try_with(|resources| resources.clone()).ok()
}

/// Run `body` with a reentrancy frame naming `resources`.
///
/// The frame is visible to everything `body` awaits on the same task and
/// is removed when the returned future completes or is dropped.
pub(crate) async fn with_frame<F: Future>(resources: String, body: F) -> F::Output {
    HELD_RESOURCES.scope(resources, body).await
}
