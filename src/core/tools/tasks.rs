use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::warn;

/// Bounded set of in-flight tool tasks for one session.
///
/// Tasks run detached from the relay loop. At teardown the set is drained:
/// tasks get a grace period to finish, after which the rest are cancelled.
#[derive(Clone)]
pub struct ToolTaskSet {
    tracker: TaskTracker,
    cancel: CancellationToken,
    capacity: usize,
}

impl ToolTaskSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            capacity,
        }
    }

    /// Spawn a task. Returns `false` without spawning when the set is full
    /// or already draining.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() || self.tracker.len() >= self.capacity {
            return false;
        }

        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = task => {}
            }
        });
        true
    }

    /// Number of tasks still running
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Stop accepting tasks and wait up to `grace` for the running ones.
    ///
    /// Returns `true` if every task finished on its own.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }

        warn!(
            pending = self.tracker.len(),
            "Tool tasks still running after {:?}, cancelling", grace
        );
        self.cancel.cancel();
        self.tracker.wait().await;
        false
    }
}
