// SQLite DeploymentBackend: submissions, their owner tag and ingestion suspension

use crate::map_sqlx_error;
use async_trait::async_trait;
use ownership_core::domain::Username;
use ownership_core::error::Result;
use ownership_core::port::{DeploymentBackend, RewriteOutcome};
use sqlx::SqlitePool;
use tracing::debug;

/// Owner tag of a submission in the index: `{owner}_{asset_uid}`
pub fn userform_id(owner: &str, asset_uid: &str) -> String {
    format!("{}_{}", owner, asset_uid)
}

pub struct SqliteDeploymentBackend {
    pool: SqlitePool,
}

impl SqliteDeploymentBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Users currently barred from submitting to the asset
    pub async fn suspended_users(&self, asset_uid: &str) -> Result<Vec<Username>> {
        sqlx::query_scalar(
            "SELECT username FROM submission_suspensions WHERE asset_uid = ? ORDER BY username",
        )
        .bind(asset_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl DeploymentBackend for SqliteDeploymentBackend {
    async fn suspend_submissions(&self, asset_uid: &str, users: &[Username]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for user in users {
            sqlx::query(
                "INSERT OR IGNORE INTO submission_suspensions (asset_uid, username) VALUES (?, ?)",
            )
            .bind(asset_uid)
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(asset_uid = %asset_uid, users = ?users, "Submissions suspended");
        Ok(())
    }

    async fn resume_submissions(&self, asset_uid: &str) -> Result<()> {
        sqlx::query("DELETE FROM submission_suspensions WHERE asset_uid = ?")
            .bind(asset_uid)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(asset_uid = %asset_uid, "Submissions resumed");
        Ok(())
    }

    async fn submission_ids(&self, asset_uid: &str) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT id FROM submissions WHERE asset_uid = ? ORDER BY id ASC")
            .bind(asset_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn rewrite_submission_owner(
        &self,
        asset_uid: &str,
        new_owner: &str,
    ) -> Result<RewriteOutcome> {
        let tag = userform_id(new_owner, asset_uid);
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let modified = sqlx::query(
            "UPDATE submissions SET userform_id = ? WHERE asset_uid = ? AND userform_id != ?",
        )
        .bind(&tag)
        .bind(asset_uid)
        .bind(&tag)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        let expected: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE asset_uid = ?")
            .bind(asset_uid)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let matched: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions WHERE asset_uid = ? AND userform_id = ?",
        )
        .bind(asset_uid)
        .bind(&tag)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(RewriteOutcome {
            expected: expected as u64,
            matched: matched as u64,
            modified,
        })
    }
}
