// SQLite TransferRepository Implementation

use crate::rows::{
    AssetRow, InviteRow, SnapshotRow, StatusRow, StoredFileRow, TransferRow, FILE_COLUMNS,
    INVITE_COLUMNS, STATUS_COLUMNS, TRANSFER_COLUMNS,
};
use crate::{map_sqlx_error, SqliteTransferTransaction};
use async_trait::async_trait;
use ownership_core::domain::{
    Asset, FileKind, Invite, InviteStatus, StatusType, StoredFile, Transfer, TransferId,
    TransferState, TransferStatus,
};
use ownership_core::error::{AppError, Result};
use ownership_core::port::{
    TaskSnapshot, TransactionalTransferRepository, TransferRepository, TransferTransaction,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Bound parameters per `IN (...)` chunk
const IN_CHUNK: usize = 500;

pub struct SqliteTransferRepository {
    pool: SqlitePool,
}

impl SqliteTransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TransferRepository for SqliteTransferRepository {
    async fn find_asset(&self, uid: &str) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(
            "SELECT uid, name, owner, has_deployment FROM assets WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AssetRow::into_asset))
    }

    async fn find_invite(&self, uid: &str) -> Result<Option<Invite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {} FROM invites WHERE uid = ?",
            INVITE_COLUMNS
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(InviteRow::into_invite).transpose()
    }

    async fn find_invites_by_status(&self, status: InviteStatus) -> Result<Vec<Invite>> {
        let rows = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {} FROM invites WHERE status = ? ORDER BY created_at ASC",
            INVITE_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(InviteRow::into_invite).collect()
    }

    async fn find_transfer(&self, id: TransferId) -> Result<Option<Transfer>> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transfers WHERE id = ?",
            TRANSFER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TransferRow::into_transfer))
    }

    async fn find_transfers_by_invite(&self, invite_uid: &str) -> Result<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transfers WHERE invite_uid = ? ORDER BY id ASC",
            TRANSFER_COLUMNS
        ))
        .bind(invite_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TransferRow::into_transfer).collect())
    }

    async fn get_status(&self, id: TransferId, status_type: StatusType) -> Result<TransferStatus> {
        let row = sqlx::query_as::<_, StatusRow>(&format!(
            "SELECT {} FROM transfer_statuses WHERE transfer_id = ? AND status_type = ?",
            STATUS_COLUMNS
        ))
        .bind(id)
        .bind(status_type.as_str())
        .fetch_optional(&self.pool)
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

    async fn list_statuses(&self, id: TransferId) -> Result<Vec<TransferStatus>> {
        let rows = sqlx::query_as::<_, StatusRow>(&format!(
            "SELECT {} FROM transfer_statuses WHERE transfer_id = ? ORDER BY rowid ASC",
            STATUS_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(StatusRow::into_status).collect()
    }

    async fn touch_status(
        &self,
        id: TransferId,
        status_type: StatusType,
        now_millis: i64,
    ) -> Result<()> {
        // Settled rows keep their last write time
        sqlx::query(
            r#"
            UPDATE transfer_statuses
            SET modified_at = ?
            WHERE transfer_id = ? AND status_type = ? AND status = ?
            "#,
        )
        .bind(now_millis)
        .bind(id)
        .bind(status_type.as_str())
        .bind(TransferState::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_async_tasks(&self, state: TransferState) -> Result<Vec<TaskSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT s.transfer_id, s.status_type, s.status, s.error, s.modified_at,
                   t.created_at AS transfer_created_at
            FROM transfer_statuses s
            JOIN transfers t ON t.id = s.transfer_id
            WHERE s.status = ? AND s.status_type != ?
            ORDER BY s.modified_at ASC
            "#,
        )
        .bind(state.as_str())
        .bind(StatusType::Global.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }

    async fn list_attachments(
        &self,
        asset_uid: &str,
        submission_ids: &[i64],
    ) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();

        for chunk in submission_ids.chunks(IN_CHUNK) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM stored_files WHERE asset_uid = ",
                FILE_COLUMNS
            ));
            query.push_bind(asset_uid);
            query.push(" AND kind = ");
            query.push_bind(FileKind::Attachment.as_str());
            query.push(" AND submission_id IN (");
            let mut ids = query.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(") ORDER BY id ASC");

            let rows = query
                .build_query_as::<StoredFileRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            for row in rows {
                files.push(row.into_file()?);
            }
        }

        Ok(files)
    }

    async fn list_media_files(&self, asset_uid: &str) -> Result<Vec<StoredFile>> {
        let rows = sqlx::query_as::<_, StoredFileRow>(&format!(
            "SELECT {} FROM stored_files WHERE asset_uid = ? AND kind = ? ORDER BY id ASC",
            FILE_COLUMNS
        ))
        .bind(asset_uid)
        .bind(FileKind::MediaFile.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(StoredFileRow::into_file).collect()
    }

    async fn update_file_path(&self, file_id: i64, storage_path: &str) -> Result<()> {
        let result = sqlx::query("UPDATE stored_files SET storage_path = ? WHERE id = ?")
            .bind(storage_path)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Stored file {} not found", file_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionalTransferRepository for SqliteTransferRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn TransferTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteTransferTransaction::new(tx)))
    }
}
