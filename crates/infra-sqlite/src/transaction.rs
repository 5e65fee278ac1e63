// SQLite Transaction Implementation
//
// SQLite has no SELECT ... FOR UPDATE: a lock is taken with a no-op UPDATE
// on the row, which acquires the database write lock before the read.

use crate::map_sqlx_error;
use crate::rows::{InviteRow, StatusRow, TransferRow, INVITE_COLUMNS, STATUS_COLUMNS, TRANSFER_COLUMNS};
use async_trait::async_trait;
use ownership_core::domain::{
    FileKind, Invite, InviteStatus, NewTransfer, StatusType, Transfer, TransferId,
    TransferState, TransferStatus,
};
use ownership_core::error::{AppError, Result};
use ownership_core::port::{Transaction, TransferTransaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

pub struct SqliteTransferTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteTransferTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteTransferTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TransferTransaction for SqliteTransferTransaction {
    async fn lock_status(
        &mut self,
        id: TransferId,
        status_type: StatusType,
    ) -> Result<TransferStatus> {
        sqlx::query(
            "UPDATE transfer_statuses SET modified_at = modified_at WHERE transfer_id = ? AND status_type = ?",
        )
        .bind(id)
        .bind(status_type.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, StatusRow>(&format!(
            "SELECT {} FROM transfer_statuses WHERE transfer_id = ? AND status_type = ?",
            STATUS_COLUMNS
        ))
        .bind(id)
        .bind(status_type.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => row.into_status(),
            None => Err(AppError::NotFound(format!(
                "Status {} of transfer {} not found",
                status_type, id
            ))),
        }
    }

    async fn save_status(&mut self, status: &TransferStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_statuses
            SET status = ?, error = ?, modified_at = ?
            WHERE transfer_id = ? AND status_type = ?
            "#,
        )
        .bind(status.status.as_str())
        .bind(&status.error)
        .bind(status.modified_at)
        .bind(status.transfer_id)
        .bind(status.status_type.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Status {} of transfer {} not found",
                status.status_type, status.transfer_id
            )));
        }

        sqlx::query("UPDATE transfers SET modified_at = ? WHERE id = ?")
            .bind(status.modified_at)
            .bind(status.transfer_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_statuses(&mut self, id: TransferId) -> Result<Vec<TransferStatus>> {
        let rows = sqlx::query_as::<_, StatusRow>(&format!(
            "SELECT {} FROM transfer_statuses WHERE transfer_id = ? ORDER BY rowid ASC",
            STATUS_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(StatusRow::into_status).collect()
    }

    async fn find_transfer(&mut self, id: TransferId) -> Result<Option<Transfer>> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transfers WHERE id = ?",
            TRANSFER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TransferRow::into_transfer))
    }

    async fn find_invite(&mut self, uid: &str) -> Result<Option<Invite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {} FROM invites WHERE uid = ?",
            INVITE_COLUMNS
        ))
        .bind(uid)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(InviteRow::into_invite).transpose()
    }

    async fn lock_invite(&mut self, uid: &str) -> Result<Option<Invite>> {
        sqlx::query("UPDATE invites SET modified_at = modified_at WHERE uid = ?")
            .bind(uid)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        self.find_invite(uid).await
    }

    async fn global_states_for_invite(&mut self, invite_uid: &str) -> Result<Vec<TransferState>> {
        let states: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT s.status
            FROM transfer_statuses s
            JOIN transfers t ON t.id = s.transfer_id
            WHERE t.invite_uid = ? AND s.status_type = ?
            ORDER BY t.id ASC
            "#,
        )
        .bind(invite_uid)
        .bind(StatusType::Global.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        states
            .iter()
            .map(|s| s.parse::<TransferState>().map_err(AppError::from))
            .collect()
    }

    async fn insert_invite(&mut self, invite: &Invite) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invites (uid, sender, recipient, status, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invite.uid)
        .bind(&invite.sender)
        .bind(&invite.recipient)
        .bind(invite.status.as_str())
        .bind(invite.created_at)
        .bind(invite.modified_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn save_invite(&mut self, invite: &Invite) -> Result<()> {
        let result = sqlx::query("UPDATE invites SET status = ?, modified_at = ? WHERE uid = ?")
            .bind(invite.status.as_str())
            .bind(invite.modified_at)
            .bind(&invite.uid)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Invite {} not found", invite.uid)));
        }
        Ok(())
    }

    async fn find_active_transfer_for_asset(
        &mut self,
        asset_uid: &str,
    ) -> Result<Option<Transfer>> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT t.id, t.uid, t.asset_uid, t.invite_uid, t.created_at, t.modified_at
            FROM transfers t
            JOIN invites i ON i.uid = t.invite_uid
            JOIN transfer_statuses s ON s.transfer_id = t.id AND s.status_type = ?
            WHERE t.asset_uid = ?
              AND i.status IN (?, ?)
              AND s.status IN (?, ?)
            ORDER BY t.id DESC
            LIMIT 1
            "#,
        )
        .bind(StatusType::Global.as_str())
        .bind(asset_uid)
        .bind(InviteStatus::Pending.as_str())
        .bind(InviteStatus::InProgress.as_str())
        .bind(TransferState::Pending.as_str())
        .bind(TransferState::InProgress.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TransferRow::into_transfer))
    }

    async fn create_transfer(&mut self, transfer: &NewTransfer) -> Result<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            INSERT INTO transfers (uid, asset_uid, invite_uid, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(&transfer.uid)
        .bind(&transfer.asset_uid)
        .bind(&transfer.invite_uid)
        .bind(transfer.created_at)
        .bind(transfer.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        let created = row.into_transfer();

        for status_type in StatusType::ALL {
            let status = TransferStatus::pending(created.id, status_type, created.created_at);
            sqlx::query(
                r#"
                INSERT INTO transfer_statuses (transfer_id, status_type, status, error, modified_at)
                VALUES (?, ?, ?, NULL, ?)
                "#,
            )
            .bind(status.transfer_id)
            .bind(status.status_type.as_str())
            .bind(status.status.as_str())
            .bind(status.modified_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        Ok(created)
    }

    async fn reassign_permissions(&mut self, asset_uid: &str, from: &str, to: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO asset_permissions (asset_uid, username, permission)
            SELECT asset_uid, ?, permission
            FROM asset_permissions
            WHERE asset_uid = ? AND username = ?
            "#,
        )
        .bind(to)
        .bind(asset_uid)
        .bind(from)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM asset_permissions WHERE asset_uid = ? AND username = ?")
            .bind(asset_uid)
            .bind(from)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn set_asset_owner(&mut self, asset_uid: &str, owner: &str) -> Result<()> {
        let result = sqlx::query("UPDATE assets SET owner = ? WHERE uid = ?")
            .bind(owner)
            .bind(asset_uid)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset {} not found", asset_uid)));
        }
        Ok(())
    }

    async fn transfer_counters_ownership(
        &mut self,
        asset_uid: &str,
        from: &str,
        to: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO submission_counters (username, asset_uid, counter)
            SELECT ?, asset_uid, counter
            FROM submission_counters
            WHERE username = ? AND asset_uid = ?
            ON CONFLICT (username, asset_uid)
            DO UPDATE SET counter = counter + excluded.counter
            "#,
        )
        .bind(to)
        .bind(from)
        .bind(asset_uid)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM submission_counters WHERE username = ? AND asset_uid = ?")
            .bind(from)
            .bind(asset_uid)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        // Attachment storage follows the asset
        let bytes: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM stored_files WHERE asset_uid = ? AND kind = ?",
        )
        .bind(asset_uid)
        .bind(FileKind::Attachment.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if bytes > 0 {
            sqlx::query(
                r#"
                INSERT INTO user_storage (username, attachment_bytes) VALUES (?, ?)
                ON CONFLICT (username)
                DO UPDATE SET attachment_bytes = attachment_bytes + excluded.attachment_bytes
                "#,
            )
            .bind(to)
            .bind(bytes)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

            sqlx::query(
                "UPDATE user_storage SET attachment_bytes = MAX(attachment_bytes - ?, 0) WHERE username = ?",
            )
            .bind(bytes)
            .bind(from)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        Ok(())
    }
}
