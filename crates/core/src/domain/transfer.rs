// Transfer Domain Model

use super::asset::AssetUid;
use super::invite::InviteUid;
use serde::{Deserialize, Serialize};

/// Transfer ID (integer, used as the task queue payload)
pub type TransferId = i64;

/// Uid prefix for transfers
pub const TRANSFER_UID_PREFIX: &str = "pot";

/// One project moving from the invite's sender to its recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub uid: String,
    pub asset_uid: AssetUid,
    pub invite_uid: InviteUid,
    pub created_at: i64, // epoch ms
    pub modified_at: i64,
}

/// Transfer to insert (the id is assigned by the store)
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub uid: String,
    pub asset_uid: AssetUid,
    pub invite_uid: InviteUid,
    pub created_at: i64,
}

impl Transfer {
    /// Age of the transfer at `now_millis`
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.created_at
    }
}

impl std::fmt::Display for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) - {}", self.uid, self.id, self.asset_uid)
    }
}
