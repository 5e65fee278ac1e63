// Transfer Status Domain Model

use super::error::{DomainError, Result};
use super::transfer::TransferId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which unit of work a status row tracks
///
/// `Global` is derived from the three async task types and is never
/// scheduled on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    Global,
    Submissions,
    MediaFiles,
    Attachments,
}

impl StatusType {
    /// Every status row a transfer owns
    pub const ALL: [StatusType; 4] = [
        StatusType::Global,
        StatusType::Submissions,
        StatusType::MediaFiles,
        StatusType::Attachments,
    ];

    /// Status rows backed by an async task
    pub const ASYNC: [StatusType; 3] = [
        StatusType::Submissions,
        StatusType::MediaFiles,
        StatusType::Attachments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusType::Global => "global",
            StatusType::Submissions => "submissions",
            StatusType::MediaFiles => "media_files",
            StatusType::Attachments => "attachments",
        }
    }

    pub fn is_async(&self) -> bool {
        !matches!(self, StatusType::Global)
    }
}

impl std::fmt::Display for StatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(StatusType::Global),
            "submissions" => Ok(StatusType::Submissions),
            "media_files" => Ok(StatusType::MediaFiles),
            "attachments" => Ok(StatusType::Attachments),
            other => Err(DomainError::UnknownStatusType(other.to_string())),
        }
    }
}

/// Transfer State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Pending => "pending",
            TransferState::InProgress => "in_progress",
            TransferState::Success => "success",
            TransferState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Success | TransferState::Failed)
    }

    /// Allowed transitions for a single status row.
    ///
    /// `InProgress -> InProgress` is the heartbeat / resume self-loop.
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Success)
                | (Pending, Failed)
                | (InProgress, InProgress)
                | (InProgress, Success)
                | (InProgress, Failed)
        )
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TransferState::Pending),
            "in_progress" => Ok(TransferState::InProgress),
            "success" => Ok(TransferState::Success),
            "failed" => Ok(TransferState::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// One status row: the unit of resumability and failure isolation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub transfer_id: TransferId,
    pub status_type: StatusType,
    pub status: TransferState,
    pub error: Option<String>,
    /// Last write, doubles as the liveness heartbeat of the task
    pub modified_at: i64,
}

impl TransferStatus {
    pub fn pending(transfer_id: TransferId, status_type: StatusType, now_millis: i64) -> Self {
        Self {
            transfer_id,
            status_type,
            status: TransferState::Pending,
            error: None,
            modified_at: now_millis,
        }
    }

    /// Move to `next`, recording `error` and refreshing the heartbeat
    pub fn transition(
        &mut self,
        next: TransferState,
        error: Option<String>,
        now_millis: i64,
    ) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: format!("{}:{}", self.status_type, self.status),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.error = error;
        self.modified_at = now_millis;
        Ok(())
    }
}

/// Recompute the global state from the async rows of one transfer.
///
/// Returns `None` when the async rows have not settled and the global row
/// should stay as it is. A failure wins over everything else.
pub fn derive_global(statuses: &[TransferStatus]) -> Option<(TransferState, Option<String>)> {
    let async_rows: Vec<&TransferStatus> = statuses
        .iter()
        .filter(|s| s.status_type.is_async())
        .collect();

    if let Some(failed) = async_rows
        .iter()
        .find(|s| s.status == TransferState::Failed)
    {
        let error = failed
            .error
            .clone()
            .unwrap_or_else(|| format!("{} task failed", failed.status_type));
        return Some((TransferState::Failed, Some(error)));
    }

    let all_present = StatusType::ASYNC
        .iter()
        .all(|t| async_rows.iter().any(|s| s.status_type == *t));

    if all_present && async_rows.iter().all(|s| s.status == TransferState::Success) {
        return Some((TransferState::Success, None));
    }

    None
}
