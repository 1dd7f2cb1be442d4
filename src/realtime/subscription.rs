//! Explicit subscription handles, per §9's redesign flag: replace "async
//! callback webs for subscription management" (each subscribe returns a
//! disposer closure) with a plain value the caller can hold and call
//! `unsubscribe()` on. No closures, no implicit cleanup-on-drop magic.

use tokio::task::AbortHandle;

/// Returned by [`super::connection::ConnectionManager::subscribe`]. Dropping
/// this value does *not* unsubscribe — callers must call `unsubscribe()`
/// explicitly (or the connection's registry cleans it up wholesale on
/// disconnect). That asymmetry is intentional: a handle stored in a
/// connection's subscription map must survive being moved around without a
/// `Drop` impl silently tearing down the forwarding task.
#[derive(Debug)]
pub struct SubscriptionHandle {
    pub(super) topic: String,
    pub(super) forward_task: AbortHandle,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn unsubscribe(&self) {
        self.forward_task.abort();
    }
}
