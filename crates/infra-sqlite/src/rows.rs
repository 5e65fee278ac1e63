// SQLite row representations and their domain conversions

use ownership_core::domain::{
    Asset, FileKind, Invite, StoredFile, Transfer, TransferStatus,
};
use ownership_core::error::Result;
use ownership_core::port::TaskSnapshot;

pub(crate) const STATUS_COLUMNS: &str = "transfer_id, status_type, status, error, modified_at";
pub(crate) const TRANSFER_COLUMNS: &str = "id, uid, asset_uid, invite_uid, created_at, modified_at";
pub(crate) const INVITE_COLUMNS: &str = "uid, sender, recipient, status, created_at, modified_at";
pub(crate) const FILE_COLUMNS: &str = "id, asset_uid, kind, submission_id, storage_path, size_bytes";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssetRow {
    uid: String,
    name: String,
    owner: String,
    has_deployment: bool,
}

impl AssetRow {
    pub(crate) fn into_asset(self) -> Asset {
        Asset {
            uid: self.uid,
            name: self.name,
            owner: self.owner,
            has_deployment: self.has_deployment,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct InviteRow {
    uid: String,
    sender: String,
    recipient: String,
    status: String,
    created_at: i64,
    modified_at: i64,
}

impl InviteRow {
    pub(crate) fn into_invite(self) -> Result<Invite> {
        Ok(Invite {
            uid: self.uid,
            sender: self.sender,
            recipient: self.recipient,
            status: self.status.parse()?,
            created_at: self.created_at,
            modified_at: self.modified_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransferRow {
    id: i64,
    uid: String,
    asset_uid: String,
    invite_uid: String,
    created_at: i64,
    modified_at: i64,
}

impl TransferRow {
    pub(crate) fn into_transfer(self) -> Transfer {
        Transfer {
            id: self.id,
            uid: self.uid,
            asset_uid: self.asset_uid,
            invite_uid: self.invite_uid,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StatusRow {
    transfer_id: i64,
    status_type: String,
    status: String,
    error: Option<String>,
    modified_at: i64,
}

impl StatusRow {
    pub(crate) fn into_status(self) -> Result<TransferStatus> {
        Ok(TransferStatus {
            transfer_id: self.transfer_id,
            status_type: self.status_type.parse()?,
            status: self.status.parse()?,
            error: self.error,
            modified_at: self.modified_at,
        })
    }
}

/// Status row joined with its transfer's creation time
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SnapshotRow {
    #[sqlx(flatten)]
    status: StatusRow,
    transfer_created_at: i64,
}

impl SnapshotRow {
    pub(crate) fn into_snapshot(self) -> Result<TaskSnapshot> {
        Ok(TaskSnapshot {
            status: self.status.into_status()?,
            transfer_created_at: self.transfer_created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StoredFileRow {
    id: i64,
    asset_uid: String,
    kind: String,
    submission_id: Option<i64>,
    storage_path: String,
    size_bytes: i64,
}

impl StoredFileRow {
    pub(crate) fn into_file(self) -> Result<StoredFile> {
        Ok(StoredFile {
            id: self.id,
            asset_uid: self.asset_uid,
            kind: self.kind.parse::<FileKind>()?,
            submission_id: self.submission_id,
            storage_path: self.storage_path,
            size_bytes: self.size_bytes,
        })
    }
}
