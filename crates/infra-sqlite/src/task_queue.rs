// SQLite TaskQueue Implementation

use crate::map_sqlx_error;
use async_trait::async_trait;
use ownership_core::domain::TaskMessage;
use ownership_core::error::Result;
use ownership_core::port::{QueuedTask, TaskQueue, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

const STATE_QUEUED: &str = "QUEUED";
const STATE_RUNNING: &str = "RUNNING";

pub struct SqliteTaskQueue {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteTaskQueue {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn enqueue(&self, message: TaskMessage) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO task_queue (transfer_id, task_type, state, enqueued_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(message.transfer_id)
        .bind(message.task_type.as_str())
        .bind(STATE_QUEUED)
        .bind(self.time_provider.now_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn pop_next(&self) -> Result<Option<QueuedTask>> {
        // Select and lease in one statement: two workers never share a message
        let row = sqlx::query_as::<_, QueueRow>(
            r#"
            UPDATE task_queue
            SET state = ?, leased_at = ?
            WHERE id = (
                SELECT id FROM task_queue
                WHERE state = ?
                ORDER BY id ASC
                LIMIT 1
            )
            RETURNING id, transfer_id, task_type, enqueued_at, leased_at
            "#,
        )
        .bind(STATE_RUNNING)
        .bind(self.time_provider.now_millis())
        .bind(STATE_QUEUED)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(QueueRow::into_task).transpose()
    }

    async fn ack(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM task_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn requeue_abandoned(&self, leased_before: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE task_queue
            SET state = ?, leased_at = NULL
            WHERE state = ? AND leased_at < ?
            "#,
        )
        .bind(STATE_QUEUED)
        .bind(STATE_RUNNING)
        .bind(leased_before)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM task_queue WHERE state = ?")
            .bind(STATE_QUEUED)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    id: i64,
    transfer_id: i64,
    task_type: String,
    enqueued_at: i64,
    leased_at: Option<i64>,
}

impl QueueRow {
    fn into_task(self) -> Result<QueuedTask> {
        Ok(QueuedTask {
            id: self.id,
            message: TaskMessage::new(self.transfer_id, self.task_type.parse()?)?,
            enqueued_at: self.enqueued_at,
            leased_at: self.leased_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteTransferRepository};
    use ownership_core::domain::{Invite, NewTransfer, StatusType};
    use ownership_core::port::time_provider::ManualTimeProvider;
    use ownership_core::port::{Transaction, TransactionalTransferRepository, TransferTransaction};

    async fn setup() -> (SqliteTaskQueue, Arc<ManualTimeProvider>, i64) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO assets (uid, name, owner, has_deployment) VALUES ('a1', 'Survey', 'alice', 1)")
            .execute(&pool)
            .await
            .unwrap();

        let repo = SqliteTransferRepository::new(pool.clone());
        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert_invite(&Invite::new("poi1", "alice", "bob", 0))
            .await
            .unwrap();
        let transfer = tx
            .create_transfer(&NewTransfer {
                uid: "pot1".to_string(),
                asset_uid: "a1".to_string(),
                invite_uid: "poi1".to_string(),
                created_at: 0,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let time = Arc::new(ManualTimeProvider::new(1_000));
        (SqliteTaskQueue::new(pool, time.clone()), time, transfer.id)
    }

    #[tokio::test]
    async fn test_fifo_lease_and_ack() {
        let (queue, _, transfer_id) = setup().await;
        let first = TaskMessage::new(transfer_id, StatusType::Submissions).unwrap();
        let second = TaskMessage::new(transfer_id, StatusType::MediaFiles).unwrap();
        queue.enqueue(first).await.unwrap();
        queue.enqueue(second).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 2);

        let leased = queue.pop_next().await.unwrap().unwrap();
        assert_eq!(leased.message, first);
        assert_eq!(leased.leased_at, Some(1_000));
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        queue.ack(leased.id).await.unwrap();
        let next = queue.pop_next().await.unwrap().unwrap();
        assert_eq!(next.message, second);
        assert!(queue.pop_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requeue_abandoned_leases() {
        let (queue, _, transfer_id) = setup().await;
        queue
            .enqueue(TaskMessage::new(transfer_id, StatusType::Attachments).unwrap())
            .await
            .unwrap();
        let leased = queue.pop_next().await.unwrap().unwrap();

        // Lease is not older than the cutoff yet
        assert_eq!(queue.requeue_abandoned(1_000).await.unwrap(), 0);

        assert_eq!(queue.requeue_abandoned(2_000).await.unwrap(), 1);

        let again = queue.pop_next().await.unwrap().unwrap();
        assert_eq!(again.id, leased.id);
    }
}
