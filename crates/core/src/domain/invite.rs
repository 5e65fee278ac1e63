// Invite Domain Model

use super::asset::Username;
use super::error::{DomainError, Result};
use super::status::TransferState;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Invite uid
pub type InviteUid = String;

/// Uid prefix for invites
pub const INVITE_UID_PREFIX: &str = "poi";

/// Invite Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    Declined,
    Cancelled,
    Expired,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::InProgress => "in_progress",
            InviteStatus::Complete => "complete",
            InviteStatus::Failed => "failed",
            InviteStatus::Declined => "declined",
            InviteStatus::Cancelled => "cancelled",
            InviteStatus::Expired => "expired",
        }
    }

    /// Invites still holding their assets
    pub fn is_active(&self) -> bool {
        matches!(self, InviteStatus::Pending | InviteStatus::InProgress)
    }

    /// Statuses answered by a person, never recomputed from transfers
    fn is_user_settled(&self) -> bool {
        matches!(
            self,
            InviteStatus::Declined | InviteStatus::Cancelled | InviteStatus::Expired
        )
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(InviteStatus::Pending),
            "in_progress" => Ok(InviteStatus::InProgress),
            "complete" => Ok(InviteStatus::Complete),
            "failed" => Ok(InviteStatus::Failed),
            "declined" => Ok(InviteStatus::Declined),
            "cancelled" => Ok(InviteStatus::Cancelled),
            "expired" => Ok(InviteStatus::Expired),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Invite Entity: sender offers one or more projects to recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub uid: InviteUid,
    pub sender: Username,
    pub recipient: Username,
    pub status: InviteStatus,
    pub created_at: i64, // epoch ms
    pub modified_at: i64,
}

impl Invite {
    /// Create a pending invite
    ///
    /// # Arguments
    ///
    /// * `uid` - Invite uid (injected, not generated)
    /// * `sender` - Current owner of the projects
    /// * `recipient` - Future owner
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        uid: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            uid: uid.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            status: InviteStatus::Pending,
            created_at,
            modified_at: created_at,
        }
    }

    /// Status derived from the global state of every child transfer
    pub fn derive_status(&self, transfer_states: &[TransferState]) -> InviteStatus {
        if self.status.is_user_settled() || transfer_states.is_empty() {
            return self.status;
        }

        if transfer_states.contains(&TransferState::Failed) {
            return InviteStatus::Failed;
        }

        if transfer_states.iter().all(|s| *s == TransferState::Success) {
            return InviteStatus::Complete;
        }

        if transfer_states
            .iter()
            .any(|s| matches!(s, TransferState::InProgress | TransferState::Success))
        {
            return InviteStatus::InProgress;
        }

        self.status
    }

    /// Recipient accepts: processing may start
    pub fn accept(&mut self, now_millis: i64) -> Result<()> {
        self.answer(InviteStatus::InProgress, now_millis)
    }

    /// Recipient declines
    pub fn decline(&mut self, now_millis: i64) -> Result<()> {
        self.answer(InviteStatus::Declined, now_millis)
    }

    /// Sender withdraws the invite
    pub fn cancel(&mut self, now_millis: i64) -> Result<()> {
        self.answer(InviteStatus::Cancelled, now_millis)
    }

    /// Nobody answered in time
    pub fn expire(&mut self, now_millis: i64) -> Result<()> {
        self.answer(InviteStatus::Expired, now_millis)
    }

    fn answer(&mut self, next: InviteStatus, now_millis: i64) -> Result<()> {
        if self.status != InviteStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.modified_at = now_millis;
        Ok(())
    }
}
