// Task Queue Message

use super::error::{DomainError, Result};
use super::status::StatusType;
use super::transfer::TransferId;
use serde::{Deserialize, Serialize};

/// Unit of async work: one task type of one transfer
///
/// Delivered at least once, so every task body must be idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub transfer_id: TransferId,
    pub task_type: StatusType,
}

impl TaskMessage {
    /// Build a message, rejecting the derived `global` status type
    pub fn new(transfer_id: TransferId, task_type: StatusType) -> Result<Self> {
        if !task_type.is_async() {
            return Err(DomainError::ValidationError(format!(
                "'{}' is not an async task type",
                task_type
            )));
        }
        Ok(Self {
            transfer_id,
            task_type,
        })
    }
}

impl std::fmt::Display for TaskMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.task_type, self.transfer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_never_queued() {
        assert!(TaskMessage::new(1, StatusType::Global).is_err());
        assert!(TaskMessage::new(1, StatusType::Attachments).is_ok());
    }

    #[test]
    fn test_payload_shape() {
        let message = TaskMessage::new(42, StatusType::MediaFiles).unwrap();
        let json = serde_json::to_value(message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"transfer_id": 42, "task_type": "media_files"})
        );
    }
}
