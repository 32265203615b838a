//! Change notification
//!
//! TigerStyle: One listener slot, failures contained.
//!
//! A registry holds at most one listener. It is called synchronously, inside
//! the mutating call, after the cache has been swapped and with no lock
//! held. Errors and panics from the listener are logged and dropped; they
//! never fail the mutation that triggered them.

use beacon_core::NodeSnapshot;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Receiver of slot table changes
pub trait NodeListener: Send + Sync {
    /// Called with the previous cached snapshot and the one just committed
    fn on_change(&self, old: &NodeSnapshot, new: &NodeSnapshot) -> anyhow::Result<()>;
}

impl<F> NodeListener for F
where
    F: Fn(&NodeSnapshot, &NodeSnapshot) -> anyhow::Result<()> + Send + Sync,
{
    fn on_change(&self, old: &NodeSnapshot, new: &NodeSnapshot) -> anyhow::Result<()> {
        self(old, new)
    }
}

/// Invoke `listener`, containing any error or panic
pub(crate) fn notify(listener: &dyn NodeListener, key: &str, old: &NodeSnapshot, new: &NodeSnapshot) {
    match catch_unwind(AssertUnwindSafe(|| listener.on_change(old, new))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(key, error = %e, "node listener failed");
        }
        Err(payload) => {
            error!(key, panic = panic_message(payload.as_ref()), "node listener panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
