// Idempotent task bodies
//
// Each body can be re-run from scratch: rewrites are absolute and file moves
// skip whatever already sits under the recipient's namespace.

use super::TaskRunner;
use crate::domain::{
    relocate_path, Invite, Relocation, StatusType, StoredFile, Transfer, TransferId,
    TransferState,
};
use crate::error::{AppError, Result};
use crate::port::{RewriteOutcome, StorageError};
use tracing::{debug, warn};

impl TaskRunner {
    /// Attribute every submission of the asset to the recipient.
    ///
    /// A partial rewrite is an error, never a silent success.
    pub async fn rewrite_ownership(
        &self,
        transfer: &Transfer,
        invite: &Invite,
    ) -> Result<RewriteOutcome> {
        let outcome = self
            .deployment
            .rewrite_submission_owner(&transfer.asset_uid, &invite.recipient)
            .await?;

        if !outcome.is_complete() {
            return Err(AppError::AsyncTask(format!(
                "only {} of {} submissions were rewritten",
                outcome.matched, outcome.expected
            )));
        }
        Ok(outcome)
    }

    /// Relocate submission attachments into the recipient's namespace.
    ///
    /// Requires the `submissions` task to have succeeded.
    pub async fn move_attachments(&self, transfer: &Transfer, invite: &Invite) -> Result<usize> {
        self.ensure_submissions_transferred(transfer.id).await?;

        let submission_ids = self.deployment.submission_ids(&transfer.asset_uid).await?;
        let files = self
            .repo
            .list_attachments(&transfer.asset_uid, &submission_ids)
            .await?;
        self.relocate_files(transfer, invite, StatusType::Attachments, files)
            .await
    }

    /// Relocate the form media files of the asset
    pub async fn move_media_files(&self, transfer: &Transfer, invite: &Invite) -> Result<usize> {
        let files = self.repo.list_media_files(&transfer.asset_uid).await?;
        self.relocate_files(transfer, invite, StatusType::MediaFiles, files)
            .await
    }

    pub(super) async fn ensure_submissions_transferred(&self, transfer_id: TransferId) -> Result<()> {
        let submissions = self
            .repo
            .get_status(transfer_id, StatusType::Submissions)
            .await?;
        if submissions.status != TransferState::Success {
            return Err(AppError::AsyncTask(format!(
                "attachments of transfer {} requested before submissions succeeded ({})",
                transfer_id, submissions.status
            )));
        }
        Ok(())
    }

    /// Move files one at a time: move, persist the new path, beat.
    ///
    /// Returns the number of files moved by this run.
    async fn relocate_files(
        &self,
        transfer: &Transfer,
        invite: &Invite,
        task_type: StatusType,
        files: Vec<StoredFile>,
    ) -> Result<usize> {
        let total = files.len();
        let mut moved = 0;

        for file in files {
            let target = match relocate_path(&file.storage_path, &invite.sender, &invite.recipient)
            {
                Relocation::Relocate(target) => target,
                Relocation::AlreadyRelocated => {
                    debug!(file_id = file.id, path = %file.storage_path, "Already relocated");
                    continue;
                }
                Relocation::Foreign => {
                    warn!(
                        file_id = file.id,
                        path = %file.storage_path,
                        sender = %invite.sender,
                        "File outside the sender's namespace, skipping"
                    );
                    continue;
                }
            };

            match self.storage.relocate(&file.storage_path, &target).await {
                Ok(()) => {}
                Err(StorageError::NotFound(path)) => {
                    // Record points at nothing: nothing to carry over
                    warn!(file_id = file.id, path = %path, "Stored file missing, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            self.repo.update_file_path(file.id, &target).await?;
            self.repo
                .touch_status(transfer.id, task_type, self.time_provider.now_millis())
                .await?;
            moved += 1;

            debug!(
                transfer_id = transfer.id,
                task_type = %task_type,
                file_id = file.id,
                moved = moved,
                total = total,
                "File relocated"
            );

            if !self.config.file_move_pause.is_zero() {
                tokio::time::sleep(self.config.file_move_pause).await;
            }
        }

        Ok(moved)
    }
}
