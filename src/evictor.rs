//! Background removal of expired rows.
//!
//! Expired rows are already invisible to reads; the evictor only reclaims
//! space. It runs on its own tokio task and shares nothing with request
//! handling except the store's connection pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::SessionStore;

/// Default period between eviction runs.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Handle to a running (or disabled) evictor task.
///
/// [`Evictor::stop`] consumes the handle, so a task is stopped at most once.
/// Dropping the handle cancels the task without waiting for it.
#[derive(Debug)]
pub struct Evictor {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Evictor {
    /// Spawns the evictor on the current tokio runtime.
    ///
    /// A zero `period` disables eviction: no task is spawned and the returned
    /// handle stops immediately.
    pub fn spawn(store: Arc<dyn SessionStore>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        if period.is_zero() {
            return Self { cancel, task: None };
        }

        let task = tokio::spawn(run(store, period, cancel.clone()));
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// A handle for an evictor that was never started.
    pub fn disabled() -> Self {
        Self {
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the task to stop and waits for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("session evictor task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(store: Arc<dyn SessionStore>, period: Duration, cancel: CancellationToken) {
    // First run happens one full period after start.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match store.delete_expired().await {
                    Ok(removed) => debug!(removed, "evicted expired sessions"),
                    Err(e) => warn!("failed to evict expired sessions: {e}"),
                }
            }
        }
    }
}
