//! Composition root shared by the daemon and the operator CLI

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use ownership_core::application::{
    InviteService, RecoveryService, TaskHooks, TaskRunner, TransferService, Watchdog, Worker,
};
use ownership_core::port::id_provider::UuidProvider;
use ownership_core::port::time_provider::SystemTimeProvider;
use ownership_core::port::{SystemProbe, TaskQueue, TimeProvider};
use ownership_infra_sqlite::{
    create_pool, run_migrations, SqliteDeploymentBackend, SqlitePool, SqliteTaskQueue,
    SqliteTransferRepository,
};
use ownership_infra_system::LocalFileStorage;

use crate::config::Settings;

/// Every service wired against one database and one storage root
pub struct Engine {
    pub settings: Settings,
    pub pool: SqlitePool,
    pub repo: Arc<SqliteTransferRepository>,
    pub queue: Arc<SqliteTaskQueue>,
    pub transfers: Arc<TransferService>,
    pub invites: InviteService,
    pub runner: Arc<TaskRunner>,
    pub watchdog: Arc<Watchdog>,
    pub recovery: RecoveryService,
}

impl Engine {
    /// Open (and migrate) the configured database, then wire the services
    pub async fn connect(settings: Settings) -> Result<Self> {
        if let Some(dir) = settings.database_dir() {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create database dir {}", dir.display()))?;
        }

        let url = settings.database_url();
        info!(database_url = %url, "Initializing database...");
        let pool = create_pool(&url).await.context("DB pool creation failed")?;
        run_migrations(&pool).await.context("Migration failed")?;

        Self::with_pool(settings, pool, tracing_hooks()).await
    }

    /// Wire the services over an existing, migrated pool
    pub async fn with_pool(settings: Settings, pool: SqlitePool, hooks: TaskHooks) -> Result<Self> {
        let storage_root = settings.storage_root();
        tokio::fs::create_dir_all(&storage_root)
            .await
            .with_context(|| format!("Failed to create storage root {}", storage_root.display()))?;

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let repo = Arc::new(SqliteTransferRepository::new(pool.clone()));
        let queue = Arc::new(SqliteTaskQueue::new(pool.clone(), Arc::clone(&time_provider)));
        let deployment = Arc::new(SqliteDeploymentBackend::new(pool.clone()));
        let storage = Arc::new(LocalFileStorage::new(storage_root));

        let transfers = Arc::new(TransferService::new(
            repo.clone(),
            repo.clone(),
            deployment.clone(),
            queue.clone(),
            Arc::clone(&time_provider),
        ));

        let invites = InviteService::new(
            repo.clone(),
            repo.clone(),
            Arc::clone(&transfers),
            Arc::new(UuidProvider),
            Arc::clone(&time_provider),
        )
        .with_auto_accept(settings.auto_accept_invites);

        let runner = Arc::new(TaskRunner::new(
            repo.clone(),
            repo.clone(),
            deployment,
            storage,
            queue.clone(),
            Arc::clone(&time_provider),
            hooks,
            settings.runner_config(),
        ));

        let watchdog = Arc::new(Watchdog::new(
            repo.clone(),
            repo.clone(),
            queue.clone(),
            Arc::clone(&time_provider),
            settings.watchdog_config(),
        ));

        let recovery = RecoveryService::new(
            queue.clone(),
            time_provider,
            Some(settings.recovery_window_ms()),
        );

        Ok(Self {
            settings,
            pool,
            repo,
            queue,
            transfers,
            invites,
            runner,
            watchdog,
            recovery,
        })
    }

    pub fn worker(&self, system_probe: Arc<dyn SystemProbe>) -> Worker {
        let queue: Arc<dyn TaskQueue> = self.queue.clone();
        Worker::new(
            queue,
            Arc::clone(&self.runner),
            system_probe,
            self.settings.worker_config(),
        )
    }
}

/// Error-tracking hooks: every failed or interrupted task is reported
/// through tracing with its transfer and task type.
pub fn tracing_hooks() -> TaskHooks {
    TaskHooks::new()
        .on_failure(None, |message, failure| {
            error!(
                transfer_id = message.transfer_id,
                task_type = %message.task_type,
                error = %failure,
                "Async task failed"
            );
        })
        .on_interrupted(None, |message, failure| {
            warn!(
                transfer_id = message.transfer_id,
                task_type = %message.task_type,
                reason = %failure,
                "Async task interrupted, left for the watchdog"
            );
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_settings(storage_root: &str) -> Settings {
        Settings::defaults()
            .unwrap()
            .set_override("database_url", "sqlite::memory:")
            .unwrap()
            .set_override("storage_root", storage_root)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_wires_an_idle_engine() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let settings = memory_settings(storage.to_str().unwrap());

        let engine = Engine::connect(settings).await.unwrap();

        assert!(storage.exists());
        assert_eq!(engine.queue.pending_count().await.unwrap(), 0);
        assert_eq!(engine.recovery.requeue_abandoned().await.unwrap(), 0);

        let report = engine.watchdog.run_once().await;
        assert_eq!(report, Default::default());

        let worker = engine.worker(Arc::new(
            ownership_core::port::system_probe::mocks::MockSystemProbe::new(10.0),
        ));
        assert!(!worker.process_next_task().await.unwrap());
    }
}
