// Async Task Runner - idempotent per-transfer task bodies

mod hooks;
mod operations;

pub use hooks::{TaskHook, TaskHooks};

use crate::application::transfer::StatusWriter;
use crate::domain::{StatusType, TaskMessage, TransferState};
use crate::error::{AppError, Result};
use crate::port::{
    DeploymentBackend, FileStorage, TaskQueue, TimeProvider, TransactionalTransferRepository,
    TransferRepository,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Why a task did not complete
///
/// The distinction decides the status: an interrupted task stays
/// IN_PROGRESS and is resumed by the watchdog, a logical failure is final.
#[derive(Error, Debug)]
pub enum TaskFailure {
    /// Killed from outside: time limit, worker cancellation
    #[error("Task interrupted: {0}")]
    Interrupted(String),

    /// The task body failed
    #[error("{0}")]
    Logical(#[from] AppError),
}

/// How a delivered message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Redelivery of a task that already settled
    Skipped,
}

/// Runner configuration
#[derive(Debug, Clone, Default)]
pub struct TaskRunnerConfig {
    /// Pause after each relocated file (zero disables it)
    pub file_move_pause: Duration,
}

/// Executes one async task of one transfer
pub struct TaskRunner {
    repo: Arc<dyn TransferRepository>,
    deployment: Arc<dyn DeploymentBackend>,
    storage: Arc<dyn FileStorage>,
    queue: Arc<dyn TaskQueue>,
    time_provider: Arc<dyn TimeProvider>,
    statuses: StatusWriter,
    hooks: TaskHooks,
    config: TaskRunnerConfig,
}

impl TaskRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn TransferRepository>,
        tx_repo: Arc<dyn TransactionalTransferRepository>,
        deployment: Arc<dyn DeploymentBackend>,
        storage: Arc<dyn FileStorage>,
        queue: Arc<dyn TaskQueue>,
        time_provider: Arc<dyn TimeProvider>,
        hooks: TaskHooks,
        config: TaskRunnerConfig,
    ) -> Self {
        let statuses = StatusWriter::new(tx_repo, Arc::clone(&time_provider));
        Self {
            repo,
            deployment,
            storage,
            queue,
            time_provider,
            statuses,
            hooks,
            config,
        }
    }

    /// Execute a task body without recording failures
    pub async fn execute(&self, message: TaskMessage) -> std::result::Result<TaskOutcome, TaskFailure> {
        self.execute_inner(message).await.map_err(TaskFailure::Logical)
    }

    async fn execute_inner(&self, message: TaskMessage) -> Result<TaskOutcome> {
        let transfer_id = message.transfer_id;
        let transfer = self
            .repo
            .find_transfer(transfer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer {} not found", transfer_id)))?;

        let current = self.repo.get_status(transfer_id, message.task_type).await?;
        if current.status.is_terminal() {
            info!(
                task = %message,
                status = %current.status,
                "Task already settled, skipping redelivery"
            );
            return Ok(TaskOutcome::Skipped);
        }

        let global = self.repo.get_status(transfer_id, StatusType::Global).await?;
        if global.status != TransferState::InProgress {
            return Err(AppError::AsyncTask(format!(
                "Transfer {} is not in progress ({})",
                transfer, global.status
            )));
        }

        let invite = self
            .repo
            .find_invite(&transfer.invite_uid)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Invite {} not found", transfer.invite_uid))
            })?;

        if message.task_type == StatusType::Attachments {
            self.ensure_submissions_transferred(transfer_id).await?;
        }

        self.statuses
            .update(transfer_id, message.task_type, TransferState::InProgress, None)
            .await?;
        info!(task = %message, transfer = %transfer, "Task started");

        match message.task_type {
            StatusType::Submissions => {
                let outcome = self.rewrite_ownership(&transfer, &invite).await?;
                info!(
                    task = %message,
                    matched = outcome.matched,
                    modified = outcome.modified,
                    "Submission ownership rewritten"
                );
            }
            StatusType::MediaFiles => {
                let moved = self.move_media_files(&transfer, &invite).await?;
                info!(task = %message, moved = moved, "Media files relocated");
            }
            StatusType::Attachments => {
                let moved = self.move_attachments(&transfer, &invite).await?;
                info!(task = %message, moved = moved, "Attachments relocated");
            }
            StatusType::Global => {
                return Err(AppError::AsyncTask(
                    "global status is derived, not executed".to_string(),
                ));
            }
        }

        self.statuses
            .update(transfer_id, message.task_type, TransferState::Success, None)
            .await?;

        if message.task_type == StatusType::Submissions {
            let next = TaskMessage::new(transfer_id, StatusType::Attachments)?;
            self.queue.enqueue(next).await?;
            info!(task = %next, "Attachments task chained");
        }

        Ok(TaskOutcome::Completed)
    }

    /// Persist the outcome of a failed task and notify hooks
    ///
    /// - Interrupted: the row is (re)set to IN_PROGRESS so the watchdog resumes it
    /// - Logical: the row is set to FAILED with the error text
    pub async fn record_failure(&self, message: TaskMessage, failure: &TaskFailure) -> Result<()> {
        let current = self
            .repo
            .get_status(message.transfer_id, message.task_type)
            .await?;

        if current.status.is_terminal() {
            warn!(
                task = %message,
                status = %current.status,
                error = %failure,
                "Task failed after its status settled, leaving status unchanged"
            );
            // A concurrent run already succeeded: nothing to report
            if current.status != TransferState::Success {
                self.hooks.notify(&message, failure);
            }
            return Ok(());
        }

        match failure {
            TaskFailure::Interrupted(reason) => {
                warn!(task = %message, reason = %reason, "Task interrupted, awaiting resume");
                self.statuses
                    .update(
                        message.transfer_id,
                        message.task_type,
                        TransferState::InProgress,
                        None,
                    )
                    .await?;
            }
            TaskFailure::Logical(e) => {
                error!(task = %message, error = %e, "Task failed");
                self.statuses
                    .update(
                        message.transfer_id,
                        message.task_type,
                        TransferState::Failed,
                        Some(e.to_string()),
                    )
                    .await?;
            }
        }

        self.hooks.notify(&message, failure);
        Ok(())
    }
}
