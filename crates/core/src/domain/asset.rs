// Asset & Stored File Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::DomainError;

/// Asset (project) uid
pub type AssetUid = String;

/// Account username, also the root of the owner's storage namespace
pub type Username = String;

/// Project being transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub uid: AssetUid,
    pub name: String,
    pub owner: Username,
    /// Draft projects have no deployment and no submissions
    pub has_deployment: bool,
}

/// Kind of file attached to a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// File uploaded with a submission
    Attachment,
    /// Form media (images, csv) attached to the project itself
    MediaFile,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Attachment => "attachment",
            FileKind::MediaFile => "media_file",
        }
    }
}

impl FromStr for FileKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attachment" => Ok(FileKind::Attachment),
            "media_file" => Ok(FileKind::MediaFile),
            other => Err(DomainError::ValidationError(format!(
                "Unknown file kind: {}",
                other
            ))),
        }
    }
}

/// File record pointing at a storage path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: i64,
    pub asset_uid: AssetUid,
    pub kind: FileKind,
    /// Owning submission (attachments only)
    pub submission_id: Option<i64>,
    pub storage_path: String,
    pub size_bytes: i64,
}

/// Where a stored path goes when its project changes owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// Already under the new owner's namespace
    AlreadyRelocated,
    /// Move to this path
    Relocate(String),
    /// Under neither namespace, left alone
    Foreign,
}

/// Compute the destination of `path` when moving from `from_owner` to
/// `to_owner`. Paths are namespaced as `{owner}/...`.
pub fn relocate_path(path: &str, from_owner: &str, to_owner: &str) -> Relocation {
    let to_prefix = format!("{}/", to_owner);
    if path.starts_with(&to_prefix) {
        return Relocation::AlreadyRelocated;
    }

    let from_prefix = format!("{}/", from_owner);
    match path.strip_prefix(&from_prefix) {
        Some(rest) => Relocation::Relocate(format!("{}{}", to_prefix, rest)),
        None => Relocation::Foreign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocate_from_old_namespace() {
        assert_eq!(
            relocate_path("alice/attachments/form/123/photo.jpg", "alice", "bob"),
            Relocation::Relocate("bob/attachments/form/123/photo.jpg".to_string())
        );
    }

    #[test]
    fn test_already_relocated_is_skipped() {
        assert_eq!(
            relocate_path("bob/asset_files/aXyz/logo.png", "alice", "bob"),
            Relocation::AlreadyRelocated
        );
    }

    #[test]
    fn test_prefix_must_end_at_separator() {
        // "alicex" is another user, not a subfolder of "alice"
        assert_eq!(
            relocate_path("alicex/attachments/a.jpg", "alice", "bob"),
            Relocation::Foreign
        );
        assert_eq!(
            relocate_path("bobby/attachments/a.jpg", "alice", "bob"),
            Relocation::Foreign
        );
    }
}
