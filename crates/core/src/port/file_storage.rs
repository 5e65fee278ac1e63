// File Storage Port
// Physical location of attachments and form media

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    /// Both ends exist: moving would overwrite another file
    #[error("Target already exists: {0}")]
    TargetExists(String),

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

/// File storage keyed by relative paths (`{owner}/...`)
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Move a file from one path to another.
    ///
    /// Succeeds when `from` is already gone and `to` exists, so a
    /// relocation interrupted after the move can be replayed. Never
    /// overwrites: `to` occupied while `from` still exists is `TargetExists`.
    async fn relocate(&self, from: &str, to: &str) -> Result<(), StorageError>;
}
