// Transaction port for atomic operations

use crate::domain::{
    Invite, NewTransfer, StatusType, Transfer, TransferId, TransferState, TransferStatus,
};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional transfer repository
#[async_trait]
pub trait TransactionalTransferRepository: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn TransferTransaction>>;
}

/// Operations that must commit together
///
/// Dropping the transaction without committing rolls it back.
#[async_trait]
pub trait TransferTransaction: Transaction {
    /// Acquire the write lock on one status row, then read it
    async fn lock_status(&mut self, id: TransferId, status_type: StatusType)
        -> Result<TransferStatus>;

    /// Write status, error and modified_at of one row
    async fn save_status(&mut self, status: &TransferStatus) -> Result<()>;

    /// All status rows of a transfer (within transaction)
    async fn list_statuses(&mut self, id: TransferId) -> Result<Vec<TransferStatus>>;

    /// Find transfer (within transaction)
    async fn find_transfer(&mut self, id: TransferId) -> Result<Option<Transfer>>;

    /// Find invite (within transaction)
    async fn find_invite(&mut self, uid: &str) -> Result<Option<Invite>>;

    /// Acquire the write lock on an invite, then read it
    async fn lock_invite(&mut self, uid: &str) -> Result<Option<Invite>>;

    /// Global state of every transfer of an invite
    async fn global_states_for_invite(&mut self, invite_uid: &str) -> Result<Vec<TransferState>>;

    /// Insert a new invite
    async fn insert_invite(&mut self, invite: &Invite) -> Result<()>;

    /// Write status and modified_at of an invite
    async fn save_invite(&mut self, invite: &Invite) -> Result<()>;

    /// Transfer of `asset_uid` whose invite is still pending or in progress.
    ///
    /// Only reliable after a write in the same transaction took the lock.
    async fn find_active_transfer_for_asset(&mut self, asset_uid: &str)
        -> Result<Option<Transfer>>;

    /// Insert a transfer with its four PENDING status rows
    async fn create_transfer(&mut self, transfer: &NewTransfer) -> Result<Transfer>;

    /// Give `to` the permissions `from` holds on the asset, then revoke them from `from`
    async fn reassign_permissions(&mut self, asset_uid: &str, from: &str, to: &str)
        -> Result<()>;

    /// Set the asset owner
    async fn set_asset_owner(&mut self, asset_uid: &str, owner: &str) -> Result<()>;

    /// Move submission counters and attachment storage usage of the asset to `to`
    async fn transfer_counters_ownership(&mut self, asset_uid: &str, from: &str, to: &str)
        -> Result<()>;
}
