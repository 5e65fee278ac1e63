// Task Queue Port
// At-least-once delivery of (transfer_id, task_type) messages

use crate::domain::TaskMessage;
use crate::error::Result;
use async_trait::async_trait;

/// Message leased by a worker
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: i64,
    pub message: TaskMessage,
    pub enqueued_at: i64,
    pub leased_at: Option<i64>,
}

/// Task queue interface
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a message, returns the queue entry id
    async fn enqueue(&self, message: TaskMessage) -> Result<i64>;

    /// Lease the oldest queued message (atomic: two workers never get the same one)
    async fn pop_next(&self) -> Result<Option<QueuedTask>>;

    /// Remove a leased message once handled
    async fn ack(&self, id: i64) -> Result<()>;

    /// Return messages leased before `leased_before` to the queue (crash recovery)
    async fn requeue_abandoned(&self, leased_before: i64) -> Result<u64>;

    /// Messages waiting to be leased
    async fn pending_count(&self) -> Result<i64>;
}
