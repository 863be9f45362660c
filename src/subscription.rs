//! The caller-facing handle returned by [`crate::Container::register`].

use std::sync::Arc;

use crate::{container::Registration, task::TaskState};

/// A live (or not-yet-started, or cancelled-and-pending-restart) piece of
/// subscription state.
///
/// `is_active()` reflects whichever task is currently backing this
/// subscription; across a [`crate::Container::stop`]/
/// [`crate::Container::start`] cycle that backing task is rebuilt from the
/// retained request, so a `Subscription` handle stays valid for the life of
/// the container even though the `Task` underneath it does not.
#[derive(Clone)]
pub struct Subscription {
    pub(crate) inner: Arc<Registration>,
}

impl Subscription {
    /// `true` iff the backing task's state is `Running`.
    pub fn is_active(&self) -> bool {
        self.inner.current().state() == TaskState::Running
    }

    /// Cancels the backing task. A no-op if it is not currently `Starting`
    /// or `Running`. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.inner.current().cancel();
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Subscription {}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
