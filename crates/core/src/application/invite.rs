// Invite Service - offering projects to another user

use crate::application::transfer::TransferService;
use crate::domain::invite::INVITE_UID_PREFIX;
use crate::domain::transfer::TRANSFER_UID_PREFIX;
use crate::domain::{Invite, NewTransfer, Transfer, Username};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, TimeProvider, Transaction, TransactionalTransferRepository, TransferRepository,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

/// Request to offer projects to a recipient
#[derive(Debug, Clone)]
pub struct CreateInviteRequest {
    pub sender: Username,
    pub recipient: Username,
    pub asset_uids: Vec<String>,
}

/// Invite together with its transfers
#[derive(Debug, Clone)]
pub struct InviteDetails {
    pub invite: Invite,
    pub transfers: Vec<Transfer>,
}

pub struct InviteService {
    repo: Arc<dyn TransferRepository>,
    tx_repo: Arc<dyn TransactionalTransferRepository>,
    transfers: Arc<TransferService>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    auto_accept: bool,
}

impl InviteService {
    pub fn new(
        repo: Arc<dyn TransferRepository>,
        tx_repo: Arc<dyn TransactionalTransferRepository>,
        transfers: Arc<TransferService>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            repo,
            tx_repo,
            transfers,
            id_provider,
            time_provider,
            auto_accept: false,
        }
    }

    /// Accept invites on creation, on behalf of the recipient
    pub fn with_auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    /// Create a pending invite and one transfer per asset, atomically
    pub async fn create_invite(&self, req: CreateInviteRequest) -> Result<InviteDetails> {
        if req.sender == req.recipient {
            return Err(AppError::Validation(
                "sender and recipient must differ".to_string(),
            ));
        }
        if req.asset_uids.is_empty() {
            return Err(AppError::Validation("no asset to transfer".to_string()));
        }

        let mut seen = HashSet::new();
        let asset_uids: Vec<String> = req
            .asset_uids
            .into_iter()
            .filter(|uid| seen.insert(uid.clone()))
            .collect();

        for uid in &asset_uids {
            let asset = self
                .repo
                .find_asset(uid)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", uid)))?;
            if asset.owner != req.sender {
                return Err(AppError::Forbidden(format!(
                    "{} does not own asset {}",
                    req.sender, uid
                )));
            }
        }

        let now = self.time_provider.now_millis();
        let invite = Invite::new(
            self.id_provider.generate_uid(INVITE_UID_PREFIX),
            req.sender,
            req.recipient,
            now,
        );

        // The insert takes the write lock: from here on no other invite can
        // claim these assets until this one commits or rolls back
        let mut tx = self.tx_repo.begin_transaction().await?;
        tx.insert_invite(&invite).await?;
        for uid in &asset_uids {
            if let Some(active) = tx.find_active_transfer_for_asset(uid).await? {
                return Err(AppError::Conflict(format!(
                    "Asset {} already has an active transfer ({})",
                    uid, active.uid
                )));
            }
        }

        let mut transfers = Vec::with_capacity(asset_uids.len());
        for asset_uid in asset_uids {
            let transfer = tx
                .create_transfer(&NewTransfer {
                    uid: self.id_provider.generate_uid(TRANSFER_UID_PREFIX),
                    asset_uid,
                    invite_uid: invite.uid.clone(),
                    created_at: now,
                })
                .await?;
            transfers.push(transfer);
        }
        tx.commit().await?;

        info!(
            invite_uid = %invite.uid,
            sender = %invite.sender,
            recipient = %invite.recipient,
            transfers = transfers.len(),
            "Invite created"
        );

        if self.auto_accept {
            let recipient = invite.recipient.clone();
            return self.accept(&invite.uid, &recipient).await;
        }

        Ok(InviteDetails { invite, transfers })
    }

    /// Recipient accepts: every transfer is processed.
    ///
    /// A failing transfer does not stop the others; it surfaces through the
    /// derived invite status.
    pub async fn accept(&self, invite_uid: &str, actor: &str) -> Result<InviteDetails> {
        self.answer(invite_uid, |invite, now| {
            if invite.recipient != actor {
                return Err(AppError::Forbidden(format!(
                    "only {} can accept invite {}",
                    invite.recipient, invite.uid
                )));
            }
            invite.accept(now).map_err(AppError::from)
        })
        .await?;

        let transfers = self.repo.find_transfers_by_invite(invite_uid).await?;
        for transfer in &transfers {
            if let Err(e) = self.transfers.process(transfer.id).await {
                error!(transfer = %transfer, error = %e, "Transfer failed on accept");
            }
        }

        self.details(invite_uid).await
    }

    /// Recipient declines
    pub async fn decline(&self, invite_uid: &str, actor: &str) -> Result<Invite> {
        self.answer(invite_uid, |invite, now| {
            if invite.recipient != actor {
                return Err(AppError::Forbidden(format!(
                    "only {} can decline invite {}",
                    invite.recipient, invite.uid
                )));
            }
            invite.decline(now).map_err(AppError::from)
        })
        .await
    }

    /// Sender withdraws
    pub async fn cancel(&self, invite_uid: &str, actor: &str) -> Result<Invite> {
        self.answer(invite_uid, |invite, now| {
            if invite.sender != actor {
                return Err(AppError::Forbidden(format!(
                    "only {} can cancel invite {}",
                    invite.sender, invite.uid
                )));
            }
            invite.cancel(now).map_err(AppError::from)
        })
        .await
    }

    /// Invite with its transfers
    pub async fn details(&self, invite_uid: &str) -> Result<InviteDetails> {
        let invite = self
            .repo
            .find_invite(invite_uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invite {} not found", invite_uid)))?;
        let transfers = self.repo.find_transfers_by_invite(invite_uid).await?;
        Ok(InviteDetails { invite, transfers })
    }

    /// Lock the invite, apply a user answer, persist
    async fn answer<F>(&self, invite_uid: &str, apply: F) -> Result<Invite>
    where
        F: FnOnce(&mut Invite, i64) -> Result<()> + Send,
    {
        let now = self.time_provider.now_millis();
        let mut tx = self.tx_repo.begin_transaction().await?;
        let mut invite = tx
            .lock_invite(invite_uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invite {} not found", invite_uid)))?;

        let previous = invite.status;
        apply(&mut invite, now)?;
        tx.save_invite(&invite).await?;
        tx.commit().await?;

        info!(
            invite_uid = %invite.uid,
            from = %previous,
            to = %invite.status,
            "Invite answered"
        );
        Ok(invite)
    }
}
