//! Small runtime wrappers, split out the same way the driver separates its
//! own `spawn`/timing helpers from the rest of the crate.

use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

/// The fixed backoff between unsuccessful cursor-health checks during task
/// startup.
pub(crate) const STARTUP_BACKOFF: Duration = Duration::from_millis(100);

/// The fixed backoff after an empty, non-blocking poll of a running cursor.
pub(crate) const EMPTY_POLL_BACKOFF: Duration = Duration::from_millis(10);

/// Spawns a future on the ambient tokio runtime. A task occupies this
/// worker for its entire lifetime; there is no time-slicing or sharing with
/// other tasks.
pub(crate) fn spawn<F>(future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(future)
}

pub(crate) async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
