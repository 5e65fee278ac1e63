// Watchdog - periodic sweeps over async task heartbeats
//
// Resume: IN_PROGRESS task whose heartbeat went quiet, transfer still young.
// Fail: IN_PROGRESS task whose transfer outlived the stuck threshold.
// The global row is derived and never swept.

use crate::application::transfer::StatusWriter;
use crate::application::worker::constants::{
    DEFAULT_INVITE_EXPIRY_DAYS, DEFAULT_RESUME_THRESHOLD_MINUTES,
    DEFAULT_STUCK_THRESHOLD_MINUTES, DEFAULT_WATCHDOG_INTERVAL, MILLIS_PER_MINUTE,
};
use crate::application::worker::ShutdownToken;
use crate::domain::{InviteStatus, StatusType, TaskMessage, TransferState};
use crate::error::{AppError, Result};
use crate::port::{
    TaskQueue, TaskSnapshot, TimeProvider, Transaction, TransactionalTransferRepository,
    TransferRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Watchdog thresholds
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub resume_threshold_minutes: i64,
    pub stuck_threshold_minutes: i64,
    pub invite_expiry_days: i64,
    pub interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            resume_threshold_minutes: DEFAULT_RESUME_THRESHOLD_MINUTES,
            stuck_threshold_minutes: DEFAULT_STUCK_THRESHOLD_MINUTES,
            invite_expiry_days: DEFAULT_INVITE_EXPIRY_DAYS,
            interval: DEFAULT_WATCHDOG_INTERVAL,
        }
    }
}

impl WatchdogConfig {
    fn resume_threshold_ms(&self) -> i64 {
        self.resume_threshold_minutes * MILLIS_PER_MINUTE
    }

    fn stuck_threshold_ms(&self) -> i64 {
        self.stuck_threshold_minutes * MILLIS_PER_MINUTE
    }

    fn invite_expiry_ms(&self) -> i64 {
        self.invite_expiry_days * 24 * 60 * MILLIS_PER_MINUTE
    }

    /// Error text written on tasks failed by the watchdog
    pub fn stuck_message(&self) -> String {
        format!("Task has been stuck for {} minutes", self.stuck_threshold_minutes)
    }
}

/// What the watchdog does with one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Resume,
    Fail,
    Wait,
}

/// Decide the fate of a task from its heartbeat and its transfer's age.
/// The stuck threshold wins over the resume threshold.
pub fn classify(
    heartbeat: i64,
    transfer_created_at: i64,
    now: i64,
    config: &WatchdogConfig,
) -> SweepAction {
    if transfer_created_at <= now - config.stuck_threshold_ms() {
        SweepAction::Fail
    } else if heartbeat <= now - config.resume_threshold_ms() {
        SweepAction::Resume
    } else {
        SweepAction::Wait
    }
}

/// Counts of one watchdog tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub resumed: usize,
    pub failed: usize,
    pub orphans_resumed: usize,
    pub invites_expired: usize,
}

pub struct Watchdog {
    repo: Arc<dyn TransferRepository>,
    tx_repo: Arc<dyn TransactionalTransferRepository>,
    queue: Arc<dyn TaskQueue>,
    time_provider: Arc<dyn TimeProvider>,
    statuses: StatusWriter,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(
        repo: Arc<dyn TransferRepository>,
        tx_repo: Arc<dyn TransactionalTransferRepository>,
        queue: Arc<dyn TaskQueue>,
        time_provider: Arc<dyn TimeProvider>,
        config: WatchdogConfig,
    ) -> Self {
        let statuses = StatusWriter::new(Arc::clone(&tx_repo), Arc::clone(&time_provider));
        Self {
            repo,
            tx_repo,
            queue,
            time_provider,
            statuses,
            config,
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Re-enqueue IN_PROGRESS tasks whose worker went away
    pub async fn resume_stuck_tasks(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let tasks = self.repo.find_async_tasks(TransferState::InProgress).await?;

        let mut resumed = 0;
        for task in tasks {
            if self.classify_snapshot(&task, now) != SweepAction::Resume {
                continue;
            }
            match self.resume(&task).await {
                Ok(()) => resumed += 1,
                Err(e) => warn!(
                    transfer_id = task.status.transfer_id,
                    task_type = %task.status.status_type,
                    error = %e,
                    "Failed to resume task"
                ),
            }
        }

        if resumed > 0 {
            info!(resumed = resumed, "Resumed stalled tasks");
        }
        Ok(resumed)
    }

    /// Fail IN_PROGRESS tasks of transfers older than the stuck threshold
    pub async fn fail_stuck_tasks(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let tasks = self.repo.find_async_tasks(TransferState::InProgress).await?;

        let mut failed = 0;
        for task in tasks {
            if self.classify_snapshot(&task, now) != SweepAction::Fail {
                continue;
            }
            match self.fail(&task).await {
                Ok(()) => failed += 1,
                Err(e) => warn!(
                    transfer_id = task.status.transfer_id,
                    task_type = %task.status.status_type,
                    error = %e,
                    "Failed to mark stuck task"
                ),
            }
        }

        if failed > 0 {
            warn!(failed = failed, "Failed stuck tasks");
        }
        Ok(failed)
    }

    /// Re-enqueue `attachments` when `submissions` succeeded but the chained
    /// message never ran (lost between the status write and the enqueue).
    ///
    /// The submissions heartbeat stands in for the attachments heartbeat.
    pub async fn resume_orphaned_tasks(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let pending = self.repo.find_async_tasks(TransferState::Pending).await?;

        let mut handled = 0;
        for task in pending
            .into_iter()
            .filter(|t| t.status.status_type == StatusType::Attachments)
        {
            let transfer_id = task.status.transfer_id;
            let global = self.repo.get_status(transfer_id, StatusType::Global).await?;
            if global.status != TransferState::InProgress {
                continue;
            }
            let submissions = self
                .repo
                .get_status(transfer_id, StatusType::Submissions)
                .await?;
            if submissions.status != TransferState::Success {
                continue;
            }

            let result = match classify(
                submissions.modified_at,
                task.transfer_created_at,
                now,
                &self.config,
            ) {
                SweepAction::Resume => self.resume(&task).await,
                SweepAction::Fail => self.fail(&task).await,
                SweepAction::Wait => continue,
            };
            match result {
                Ok(()) => handled += 1,
                Err(e) => warn!(
                    transfer_id = transfer_id,
                    error = %e,
                    "Failed to settle orphaned attachments task"
                ),
            }
        }

        if handled > 0 {
            info!(handled = handled, "Settled orphaned attachments tasks");
        }
        Ok(handled)
    }

    /// Expire invites nobody answered within the expiry window
    pub async fn expire_invites(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.config.invite_expiry_ms();
        let invites = self.repo.find_invites_by_status(InviteStatus::Pending).await?;

        let mut expired = 0;
        for invite in invites.into_iter().filter(|i| i.created_at <= cutoff) {
            let mut tx = self.tx_repo.begin_transaction().await?;
            let mut locked = match tx.lock_invite(&invite.uid).await? {
                Some(locked) if locked.status == InviteStatus::Pending => locked,
                _ => {
                    // Answered since the listing
                    tx.rollback().await?;
                    continue;
                }
            };
            locked.expire(now).map_err(AppError::from)?;
            tx.save_invite(&locked).await?;
            tx.commit().await?;

            info!(invite_uid = %locked.uid, sender = %locked.sender, "Invite expired");
            expired += 1;
        }
        Ok(expired)
    }

    /// One tick: every sweep, each isolated from the others' errors
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.fail_stuck_tasks().await {
            Ok(n) => report.failed = n,
            Err(e) => error!(error = %e, "Fail sweep error"),
        }
        match self.resume_stuck_tasks().await {
            Ok(n) => report.resumed = n,
            Err(e) => error!(error = %e, "Resume sweep error"),
        }
        match self.resume_orphaned_tasks().await {
            Ok(n) => report.orphans_resumed = n,
            Err(e) => error!(error = %e, "Orphan sweep error"),
        }
        match self.expire_invites().await {
            Ok(n) => report.invites_expired = n,
            Err(e) => error!(error = %e, "Invite expiry sweep error"),
        }

        debug!(report = ?report, "Watchdog tick");
        report
    }

    /// Tick on the configured interval until shutdown
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            resume_threshold_minutes = self.config.resume_threshold_minutes,
            stuck_threshold_minutes = self.config.stuck_threshold_minutes,
            "Watchdog started"
        );
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.wait() => {
                    info!("Watchdog stopped");
                    break;
                }
            }
        }
    }

    fn classify_snapshot(&self, task: &TaskSnapshot, now: i64) -> SweepAction {
        classify(
            task.status.modified_at,
            task.transfer_created_at,
            now,
            &self.config,
        )
    }

    /// Beat the heartbeat first so the next tick does not resume it again
    async fn resume(&self, task: &TaskSnapshot) -> Result<()> {
        let status = &task.status;
        let message = TaskMessage::new(status.transfer_id, status.status_type)?;
        self.statuses
            .update(
                status.transfer_id,
                status.status_type,
                TransferState::InProgress,
                None,
            )
            .await?;
        self.queue.enqueue(message).await?;
        info!(task = %message, "Task resumed");
        Ok(())
    }

    async fn fail(&self, task: &TaskSnapshot) -> Result<()> {
        let status = &task.status;
        self.statuses
            .update(
                status.transfer_id,
                status.status_type,
                TransferState::Failed,
                Some(self.config.stuck_message()),
            )
            .await?;
        warn!(
            transfer_id = status.transfer_id,
            task_type = %status.status_type,
            "Task failed as stuck"
        );
        Ok(())
    }
}
