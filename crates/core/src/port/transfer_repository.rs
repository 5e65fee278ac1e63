// Transfer Repository Port (Interface)

use crate::domain::{
    Asset, Invite, InviteStatus, StatusType, StoredFile, Transfer, TransferId, TransferState,
    TransferStatus,
};
use crate::error::Result;
use async_trait::async_trait;

/// Async status row together with the age reference of its transfer
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub status: TransferStatus,
    pub transfer_created_at: i64,
}

/// Repository interface for reads and single-row writes outside a transaction
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Find asset by uid
    async fn find_asset(&self, uid: &str) -> Result<Option<Asset>>;

    /// Find invite by uid
    async fn find_invite(&self, uid: &str) -> Result<Option<Invite>>;

    /// All invites currently in `status`
    async fn find_invites_by_status(&self, status: InviteStatus) -> Result<Vec<Invite>>;

    /// Find transfer by id
    async fn find_transfer(&self, id: TransferId) -> Result<Option<Transfer>>;

    /// Transfers belonging to an invite, oldest first
    async fn find_transfers_by_invite(&self, invite_uid: &str) -> Result<Vec<Transfer>>;

    /// One status row (NotFound if the transfer does not exist)
    async fn get_status(&self, id: TransferId, status_type: StatusType) -> Result<TransferStatus>;

    /// All status rows of a transfer
    async fn list_statuses(&self, id: TransferId) -> Result<Vec<TransferStatus>>;

    /// Refresh the heartbeat of a running task without touching its state
    async fn touch_status(&self, id: TransferId, status_type: StatusType, now_millis: i64)
        -> Result<()>;

    /// Async (non-global) status rows in `state`, with their transfer's creation time
    async fn find_async_tasks(&self, state: TransferState) -> Result<Vec<TaskSnapshot>>;

    /// Attachments referenced by the given submissions of an asset
    async fn list_attachments(&self, asset_uid: &str, submission_ids: &[i64])
        -> Result<Vec<StoredFile>>;

    /// Form media files of an asset
    async fn list_media_files(&self, asset_uid: &str) -> Result<Vec<StoredFile>>;

    /// Persist the new storage path of one file
    async fn update_file_path(&self, file_id: i64, storage_path: &str) -> Result<()>;
}
