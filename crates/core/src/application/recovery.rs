// Crash recovery: queue messages leased by a worker that died
use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;
use crate::port::{TaskQueue, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Crash recovery service
///
/// On daemon startup, returns messages leased longer than the recovery
/// window to the queue. Status rows are left alone: task bodies are
/// idempotent and the runner skips settled tasks.
pub struct RecoveryService {
    queue: Arc<dyn TaskQueue>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `queue` - Task queue
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(queue, time_provider, None);
    /// let requeued = recovery.requeue_abandoned().await?;
    /// ```
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            queue,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Requeue messages leased before `now - recovery_window`
    ///
    /// # Returns
    /// Number of messages requeued
    pub async fn requeue_abandoned(&self) -> crate::error::Result<u64> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting abandoned task recovery"
        );

        let requeued = self.queue.requeue_abandoned(cutoff).await?;

        info!(requeued_count = %requeued, "Abandoned task recovery complete");
        Ok(requeued)
    }
}
