// Status writes with cascade: task row -> global row -> invite

use crate::domain::{derive_global, StatusType, TransferId, TransferState, TransferStatus};
use crate::error::{AppError, Result};
use crate::port::{
    TimeProvider, Transaction, TransactionalTransferRepository, TransferTransaction,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Single entry point for status transitions.
///
/// Every write locks the row, validates the transition and recomputes the
/// derived statuses in the same transaction, so concurrent writers on one
/// transfer cannot interleave.
#[derive(Clone)]
pub struct StatusWriter {
    tx_repo: Arc<dyn TransactionalTransferRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl StatusWriter {
    pub fn new(
        tx_repo: Arc<dyn TransactionalTransferRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            tx_repo,
            time_provider,
        }
    }

    /// Transition one status row and cascade
    pub async fn update(
        &self,
        transfer_id: TransferId,
        status_type: StatusType,
        state: TransferState,
        error: Option<String>,
    ) -> Result<TransferStatus> {
        let now = self.time_provider.now_millis();
        let mut tx = self.tx_repo.begin_transaction().await?;
        let status = transition_in(&mut *tx, transfer_id, status_type, state, error, now).await?;
        tx.commit().await?;
        Ok(status)
    }

    /// Move the global row from PENDING to IN_PROGRESS.
    ///
    /// The check and the write happen under the same lock, so of two
    /// concurrent callers exactly one wins and the other gets
    /// `AlreadyProcessed` without any write.
    pub async fn claim(&self, transfer_id: TransferId) -> Result<TransferStatus> {
        let now = self.time_provider.now_millis();
        let mut tx = self.tx_repo.begin_transaction().await?;

        let current = tx.lock_status(transfer_id, StatusType::Global).await?;
        if current.status != TransferState::Pending {
            tx.rollback().await?;
            return Err(AppError::AlreadyProcessed(format!(
                "transfer {} is {}",
                transfer_id, current.status
            )));
        }

        let status = transition_in(
            &mut *tx,
            transfer_id,
            StatusType::Global,
            TransferState::InProgress,
            None,
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(status)
    }
}

/// Transition a row inside an open transaction, then recompute the global
/// row (for async rows) and the invite (whenever the global row changed).
pub(crate) async fn transition_in(
    tx: &mut dyn TransferTransaction,
    transfer_id: TransferId,
    status_type: StatusType,
    state: TransferState,
    error: Option<String>,
    now: i64,
) -> Result<TransferStatus> {
    let mut status = tx.lock_status(transfer_id, status_type).await?;
    let previous = status.status;
    status.transition(state, error, now)?;
    tx.save_status(&status).await?;

    debug!(
        transfer_id = transfer_id,
        status_type = %status_type,
        from = %previous,
        to = %state,
        "Status updated"
    );

    if status_type.is_async() {
        let statuses = tx.list_statuses(transfer_id).await?;
        if let Some((global_state, global_error)) = derive_global(&statuses) {
            let mut global = tx.lock_status(transfer_id, StatusType::Global).await?;
            if !global.status.is_terminal() {
                global.transition(global_state, global_error, now)?;
                tx.save_status(&global).await?;
                info!(
                    transfer_id = transfer_id,
                    status = %global_state,
                    "Transfer settled"
                );
                refresh_invite(tx, transfer_id, now).await?;
            }
        }
    } else if previous != state {
        refresh_invite(tx, transfer_id, now).await?;
    }

    Ok(status)
}

/// Recompute the derived status of the invite owning `transfer_id`
async fn refresh_invite(
    tx: &mut dyn TransferTransaction,
    transfer_id: TransferId,
    now: i64,
) -> Result<()> {
    let transfer = tx
        .find_transfer(transfer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {} not found", transfer_id)))?;

    let mut invite = tx
        .find_invite(&transfer.invite_uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invite {} not found", transfer.invite_uid)))?;

    let states = tx.global_states_for_invite(&invite.uid).await?;
    let derived = invite.derive_status(&states);
    if derived != invite.status {
        info!(
            invite_uid = %invite.uid,
            from = %invite.status,
            to = %derived,
            "Invite status derived"
        );
        invite.status = derived;
        invite.modified_at = now;
        tx.save_invite(&invite).await?;
    }
    Ok(())
}
