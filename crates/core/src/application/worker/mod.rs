// Worker - task queue pull loop

pub mod constants;
mod panic_guard;
mod shutdown;

use constants::*;
pub use panic_guard::{classify_join_error, panic_message, AbortKind};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::tasks::{TaskFailure, TaskOutcome, TaskRunner};
use crate::error::{AppError, Result};
use crate::port::{QueuedTask, SystemProbe, TaskQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// Worker limits
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Soft time limit per task; exceeding it interrupts the task
    pub task_time_limit: Duration,
    /// Stop leasing tasks above this memory usage (percent)
    pub memory_throttle_percent: f32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            task_time_limit: DEFAULT_TASK_TIME_LIMIT,
            memory_throttle_percent: MEMORY_THROTTLE_THRESHOLD,
        }
    }
}

/// Worker leases task messages and runs them
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    runner: Arc<TaskRunner>,
    system_probe: Arc<dyn SystemProbe>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        runner: Arc<TaskRunner>,
        system_probe: Arc<dyn SystemProbe>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            runner,
            system_probe,
            config,
        }
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            time_limit_secs = self.config.task_time_limit.as_secs(),
            "Worker started"
        );
        loop {
            if shutdown.is_shutdown() {
                info!("Worker shutting down");
                break;
            }
            match self.process_next_task().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped");
        Ok(())
    }

    /// Lease and run the next task (returns true if a task was handled)
    pub async fn process_next_task(&self) -> Result<bool> {
        // A task killed for memory mid-move would only be resumed later
        let metrics = self.system_probe.get_metrics().await;
        let memory_usage = metrics.memory_usage_percent();
        if memory_usage > self.config.memory_throttle_percent {
            warn!(
                memory_usage = %memory_usage,
                threshold = %self.config.memory_throttle_percent,
                "System throttling: memory > threshold, not leasing tasks"
            );
            return Ok(false);
        }

        let task = match self.queue.pop_next().await? {
            Some(task) => task,
            None => return Ok(false),
        };

        info!(queue_id = task.id, task = %task.message, "Processing task");

        match self.execute_isolated(&task).await {
            Ok(outcome) => {
                info!(queue_id = task.id, task = %task.message, outcome = ?outcome, "Task handled");
            }
            Err(failure) => {
                if let Err(e) = self.runner.record_failure(task.message, &failure).await {
                    // Status stays as it was; the watchdog settles it
                    error!(
                        queue_id = task.id,
                        task = %task.message,
                        error = %e,
                        "Failed to record task failure"
                    );
                }
            }
        }

        // Failures are recorded, never handed back to the queue
        self.queue.ack(task.id).await?;
        Ok(true)
    }

    /// Run the task body in its own tokio task under the soft time limit.
    ///
    /// Panics become logical failures; timeouts and cancellation become
    /// interruptions.
    async fn execute_isolated(&self, task: &QueuedTask) -> std::result::Result<TaskOutcome, TaskFailure> {
        let runner = Arc::clone(&self.runner);
        let message = task.message;
        let handle = tokio::task::spawn(async move { runner.execute(message).await });
        let abort = handle.abort_handle();

        match timeout(self.config.task_time_limit, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => match classify_join_error(join_err) {
                AbortKind::Panicked(msg) => {
                    error!(task = %message, panic_msg = %msg, "Task panicked");
                    Err(TaskFailure::Logical(AppError::Internal(format!(
                        "task panicked: {}",
                        msg
                    ))))
                }
                AbortKind::Cancelled => {
                    Err(TaskFailure::Interrupted("worker task cancelled".to_string()))
                }
            },
            Err(_) => {
                abort.abort();
                Err(TaskFailure::Interrupted(format!(
                    "soft time limit of {}s exceeded",
                    self.config.task_time_limit.as_secs()
                )))
            }
        }
    }
}
