// Local filesystem storage
// reason: tokio::fs so relocations never block the runtime
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use ownership_core::port::file_storage::{FileStorage, StorageError};

/// File storage rooted at a local directory
///
/// Storage paths are relative (`{owner}/attachments/...`). Absolute paths
/// and `..` components are rejected, so nothing escapes the root.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if path.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, e: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_string(),
        message: e.to_string(),
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn relocate(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;

        match (path_exists(&source).await, path_exists(&target).await) {
            (false, true) => {
                debug!(from = %from, to = %to, "Source already relocated");
                return Ok(());
            }
            (false, false) => return Err(StorageError::NotFound(from.to_string())),
            (true, true) => return Err(StorageError::TargetExists(to.to_string())),
            (true, false) => {}
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(to, e))?;
        }

        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| io_error(from, e))?;

        debug!(from = %from, to = %to, "File relocated on disk");
        Ok(())
    }
}
