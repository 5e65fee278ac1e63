// Transfer Service - processing one project ownership transfer

mod status;

pub use status::StatusWriter;
pub(crate) use status::transition_in;

use crate::domain::{
    Asset, Invite, StatusType, TaskMessage, Transfer, TransferId, TransferState, TransferStatus,
};
use crate::error::{AppError, Result};
use crate::port::{
    DeploymentBackend, TaskQueue, TimeProvider, Transaction, TransactionalTransferRepository,
    TransferRepository,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Transfer Service
///
/// Exposes the transfer contract: `process()` and the global status
/// getter/setter.
pub struct TransferService {
    repo: Arc<dyn TransferRepository>,
    tx_repo: Arc<dyn TransactionalTransferRepository>,
    deployment: Arc<dyn DeploymentBackend>,
    queue: Arc<dyn TaskQueue>,
    time_provider: Arc<dyn TimeProvider>,
    statuses: StatusWriter,
}

impl TransferService {
    pub fn new(
        repo: Arc<dyn TransferRepository>,
        tx_repo: Arc<dyn TransactionalTransferRepository>,
        deployment: Arc<dyn DeploymentBackend>,
        queue: Arc<dyn TaskQueue>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let statuses = StatusWriter::new(Arc::clone(&tx_repo), Arc::clone(&time_provider));
        Self {
            repo,
            tx_repo,
            deployment,
            queue,
            time_provider,
            statuses,
        }
    }

    /// Global state of a transfer
    pub async fn status(&self, transfer_id: TransferId) -> Result<TransferState> {
        Ok(self
            .repo
            .get_status(transfer_id, StatusType::Global)
            .await?
            .status)
    }

    /// Set the global state (cascades into the invite)
    pub async fn set_status(
        &self,
        transfer_id: TransferId,
        state: TransferState,
        error: Option<String>,
    ) -> Result<TransferStatus> {
        self.statuses
            .update(transfer_id, StatusType::Global, state, error)
            .await
    }

    /// Set the state of any status row (cascades into global and invite)
    pub async fn update_status(
        &self,
        transfer_id: TransferId,
        status_type: StatusType,
        state: TransferState,
        error: Option<String>,
    ) -> Result<TransferStatus> {
        self.statuses
            .update(transfer_id, status_type, state, error)
            .await
    }

    /// Process a transfer
    ///
    /// Algorithm:
    /// 1. Claim the global row (PENDING -> IN_PROGRESS), else `AlreadyProcessed`
    /// 2. Draft asset: reassign ownership and settle every row synchronously
    /// 3. Deployed asset: inside a submission-suspension window, move
    ///    counters and permissions atomically, then enqueue the
    ///    `submissions` and `media_files` tasks (`attachments` follows
    ///    `submissions`)
    ///
    /// Any failure after the claim marks the transfer FAILED.
    pub async fn process(&self, transfer_id: TransferId) -> Result<()> {
        let transfer = self
            .repo
            .find_transfer(transfer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer {} not found", transfer_id)))?;

        self.statuses.claim(transfer_id).await?;
        info!(transfer = %transfer, "Processing transfer");

        let result = self.process_claimed(&transfer).await;
        if let Err(e) = &result {
            error!(transfer = %transfer, error = %e, "Transfer processing failed");
            self.statuses
                .update(
                    transfer_id,
                    StatusType::Global,
                    TransferState::Failed,
                    Some(e.to_string()),
                )
                .await?;
        }
        result
    }

    async fn process_claimed(&self, transfer: &Transfer) -> Result<()> {
        let invite = self
            .repo
            .find_invite(&transfer.invite_uid)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Invite {} not found", transfer.invite_uid))
            })?;
        let asset = self
            .repo
            .find_asset(&transfer.asset_uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", transfer.asset_uid)))?;

        if asset.owner != invite.sender {
            return Err(AppError::Conflict(format!(
                "Asset {} is owned by {}, not by {}",
                asset.uid, asset.owner, invite.sender
            )));
        }

        if asset.has_deployment {
            self.process_deployed(transfer, &invite, &asset).await
        } else {
            self.process_draft(transfer, &invite, &asset).await
        }
    }

    /// Draft projects carry no data: everything settles in one transaction
    async fn process_draft(&self, transfer: &Transfer, invite: &Invite, asset: &Asset) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut tx = self.tx_repo.begin_transaction().await?;

        tx.reassign_permissions(&asset.uid, &invite.sender, &invite.recipient)
            .await?;
        tx.set_asset_owner(&asset.uid, &invite.recipient).await?;
        for task_type in StatusType::ASYNC {
            transition_in(&mut *tx, transfer.id, task_type, TransferState::Success, None, now)
                .await?;
        }

        tx.commit().await?;
        info!(transfer = %transfer, "Draft transfer completed");
        Ok(())
    }

    async fn process_deployed(
        &self,
        transfer: &Transfer,
        invite: &Invite,
        asset: &Asset,
    ) -> Result<()> {
        let users = vec![invite.sender.clone(), invite.recipient.clone()];
        self.deployment
            .suspend_submissions(&asset.uid, &users)
            .await?;

        let reassigned = self.reassign_deployed(invite, asset).await;
        let resumed = self.deployment.resume_submissions(&asset.uid).await;
        if let Err(e) = &resumed {
            warn!(asset_uid = %asset.uid, error = %e, "Failed to resume submissions");
        }
        reassigned?;
        resumed?;

        // Ownership has moved at this point. Tasks are marked IN_PROGRESS
        // before the enqueue, so a lost message is resumed by the watchdog.
        for task_type in [StatusType::Submissions, StatusType::MediaFiles] {
            let message = TaskMessage::new(transfer.id, task_type).map_err(AppError::from)?;
            self.statuses
                .update(transfer.id, task_type, TransferState::InProgress, None)
                .await?;
            match self.queue.enqueue(message).await {
                Ok(_) => info!(transfer = %transfer, task = %message, "Async task enqueued"),
                Err(e) => warn!(
                    transfer = %transfer,
                    task = %message,
                    error = %e,
                    "Enqueue failed, leaving task to the watchdog"
                ),
            }
        }
        Ok(())
    }

    /// Counters, permissions and owner move together or not at all
    async fn reassign_deployed(&self, invite: &Invite, asset: &Asset) -> Result<()> {
        let mut tx = self.tx_repo.begin_transaction().await?;
        tx.transfer_counters_ownership(&asset.uid, &invite.sender, &invite.recipient)
            .await?;
        tx.reassign_permissions(&asset.uid, &invite.sender, &invite.recipient)
            .await?;
        tx.set_asset_owner(&asset.uid, &invite.recipient).await?;
        tx.commit().await
    }
}
