// Deployment Backend Port
// The collector side of a deployed project: submissions and their index

use crate::domain::Username;
use crate::error::Result;
use async_trait::async_trait;

/// Result of rewriting submission ownership in the submission index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Submissions the asset has
    pub expected: u64,
    /// Submissions the rewrite reached
    pub matched: u64,
    /// Submissions actually changed (lower on re-runs)
    pub modified: u64,
}

impl RewriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.matched >= self.expected
    }
}

/// Deployment backend of an asset
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Stop accepting submissions for the asset from `users`
    async fn suspend_submissions(&self, asset_uid: &str, users: &[Username]) -> Result<()>;

    /// Accept submissions again
    async fn resume_submissions(&self, asset_uid: &str) -> Result<()>;

    /// Ids of every submission of the asset
    async fn submission_ids(&self, asset_uid: &str) -> Result<Vec<i64>>;

    /// Attribute every submission of the asset to `new_owner` in the index
    async fn rewrite_submission_owner(&self, asset_uid: &str, new_owner: &str)
        -> Result<RewriteOutcome>;
}
