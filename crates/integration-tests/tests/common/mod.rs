//! Shared harness: a temp-file SQLite database, a temp storage root and a
//! manual clock, wired the same way the daemon wires production services.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use ownership_core::application::{
    CreateInviteRequest, InviteDetails, InviteService, TaskHooks, TaskRunner, TaskRunnerConfig,
    TransferService, Watchdog, WatchdogConfig, Worker, WorkerConfig,
};
use ownership_core::domain::{Invite, StatusType, TransferId, TransferState, TransferStatus};
use ownership_core::port::id_provider::SequentialIdProvider;
use ownership_core::port::system_probe::mocks::MockSystemProbe;
use ownership_core::port::time_provider::ManualTimeProvider;
use ownership_core::port::{DeploymentBackend, FileStorage, TaskQueue, TransferRepository};
use ownership_infra_sqlite::{
    create_pool, run_migrations, userform_id, SqliteDeploymentBackend, SqlitePool,
    SqliteTaskQueue, SqliteTransferRepository,
};
use ownership_infra_system::LocalFileStorage;
use tempfile::TempDir;

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000_000;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// Overrides for one harness
pub struct HarnessOptions {
    pub storage: Option<Arc<dyn FileStorage>>,
    /// Builds the deployment backend over the harness pool
    pub deployment: Option<fn(SqlitePool) -> Arc<dyn DeploymentBackend>>,
    pub hooks: TaskHooks,
    pub watchdog: WatchdogConfig,
    pub worker: WorkerConfig,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            storage: None,
            deployment: None,
            hooks: TaskHooks::new(),
            watchdog: WatchdogConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub clock: Arc<ManualTimeProvider>,
    pub repo: Arc<SqliteTransferRepository>,
    pub queue: Arc<SqliteTaskQueue>,
    pub transfers: Arc<TransferService>,
    pub invites: InviteService,
    pub runner: Arc<TaskRunner>,
    pub watchdog: Watchdog,
    pub worker: Worker,
    storage_dir: TempDir,
    _db_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    pub async fn with_options(options: HarnessOptions) -> Self {
        let db_dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", db_dir.path().join("engine.db").display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let storage_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualTimeProvider::new(T0));

        let repo = Arc::new(SqliteTransferRepository::new(pool.clone()));
        let queue = Arc::new(SqliteTaskQueue::new(pool.clone(), clock.clone()));
        let deployment: Arc<dyn DeploymentBackend> = match options.deployment {
            Some(build) => build(pool.clone()),
            None => Arc::new(SqliteDeploymentBackend::new(pool.clone())),
        };
        let storage: Arc<dyn FileStorage> = options
            .storage
            .unwrap_or_else(|| Arc::new(LocalFileStorage::new(storage_dir.path())) as Arc<dyn FileStorage>);

        let transfers = Arc::new(TransferService::new(
            repo.clone(),
            repo.clone(),
            deployment.clone(),
            queue.clone(),
            clock.clone(),
        ));
        let invites = InviteService::new(
            repo.clone(),
            repo.clone(),
            transfers.clone(),
            Arc::new(SequentialIdProvider::default()),
            clock.clone(),
        );
        let runner = Arc::new(TaskRunner::new(
            repo.clone(),
            repo.clone(),
            deployment,
            storage,
            queue.clone(),
            clock.clone(),
            options.hooks,
            TaskRunnerConfig::default(),
        ));
        let watchdog = Watchdog::new(
            repo.clone(),
            repo.clone(),
            queue.clone(),
            clock.clone(),
            options.watchdog,
        );
        let worker = Worker::new(
            queue.clone(),
            runner.clone(),
            Arc::new(MockSystemProbe::new(10.0)),
            options.worker,
        );

        Self {
            pool,
            clock,
            repo,
            queue,
            transfers,
            invites,
            runner,
            watchdog,
            worker,
            storage_dir,
            _db_dir: db_dir,
        }
    }

    pub fn storage_root(&self) -> PathBuf {
        self.storage_dir.path().to_path_buf()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Project owned by `owner` with manage/view permissions
    pub async fn seed_asset(&self, uid: &str, owner: &str, deployed: bool) {
        sqlx::query("INSERT INTO assets (uid, name, owner, has_deployment) VALUES (?, ?, ?, ?)")
            .bind(uid)
            .bind(format!("Survey {}", uid))
            .bind(owner)
            .bind(deployed)
            .execute(&self.pool)
            .await
            .unwrap();
        for permission in ["manage_asset", "view_asset"] {
            sqlx::query(
                "INSERT INTO asset_permissions (asset_uid, username, permission) VALUES (?, ?, ?)",
            )
            .bind(uid)
            .bind(owner)
            .bind(permission)
            .execute(&self.pool)
            .await
            .unwrap();
        }
    }

    /// `count` submissions tagged with the owner, plus the owner's counter
    pub async fn seed_submissions(&self, asset_uid: &str, owner: &str, count: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO submissions (asset_uid, submitted_by, userform_id) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(asset_uid)
            .bind(owner)
            .bind(userform_id(owner, asset_uid))
            .fetch_one(&self.pool)
            .await
            .unwrap();
            ids.push(id);
        }
        sqlx::query(
            "INSERT INTO submission_counters (username, asset_uid, counter) VALUES (?, ?, ?)",
        )
        .bind(owner)
        .bind(asset_uid)
        .bind(count as i64)
        .execute(&self.pool)
        .await
        .unwrap();
        ids
    }

    /// File record plus the file itself under the storage root
    pub async fn seed_file(
        &self,
        asset_uid: &str,
        kind: &str,
        submission_id: Option<i64>,
        path: &str,
        body: &str,
    ) -> i64 {
        let full = self.storage_dir.path().join(path);
        tokio::fs::create_dir_all(full.parent().unwrap()).await.unwrap();
        tokio::fs::write(&full, body).await.unwrap();

        sqlx::query_scalar(
            "INSERT INTO stored_files (asset_uid, kind, submission_id, storage_path, size_bytes)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(asset_uid)
        .bind(kind)
        .bind(submission_id)
        .bind(path)
        .bind(body.len() as i64)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    pub async fn seed_attachment(&self, asset_uid: &str, submission_id: i64, path: &str, body: &str) -> i64 {
        self.seed_file(asset_uid, "attachment", Some(submission_id), path, body)
            .await
    }

    pub async fn seed_media(&self, asset_uid: &str, path: &str, body: &str) -> i64 {
        self.seed_file(asset_uid, "media_file", None, path, body).await
    }

    // ------------------------------------------------------------------
    // Flow helpers
    // ------------------------------------------------------------------

    pub async fn create_invite(&self, assets: &[&str]) -> InviteDetails {
        self.invites
            .create_invite(CreateInviteRequest {
                sender: ALICE.to_string(),
                recipient: BOB.to_string(),
                asset_uids: assets.iter().map(|a| a.to_string()).collect(),
            })
            .await
            .unwrap()
    }

    pub async fn create_and_accept(&self, assets: &[&str]) -> InviteDetails {
        let details = self.create_invite(assets).await;
        self.invites.accept(&details.invite.uid, BOB).await.unwrap()
    }

    /// Run the worker until the queue is empty
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        while self.worker.process_next_task().await.unwrap() {
            handled += 1;
        }
        handled
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn state(&self, transfer_id: TransferId, status_type: StatusType) -> TransferState {
        self.repo
            .get_status(transfer_id, status_type)
            .await
            .unwrap()
            .status
    }

    pub async fn status(&self, transfer_id: TransferId, status_type: StatusType) -> TransferStatus {
        self.repo.get_status(transfer_id, status_type).await.unwrap()
    }

    pub async fn invite(&self, uid: &str) -> Invite {
        self.repo.find_invite(uid).await.unwrap().unwrap()
    }

    pub async fn pending_tasks(&self) -> i64 {
        self.queue.pending_count().await.unwrap()
    }

    pub async fn asset_owner(&self, uid: &str) -> String {
        sqlx::query_scalar("SELECT owner FROM assets WHERE uid = ?")
            .bind(uid)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn file_path(&self, file_id: i64) -> String {
        sqlx::query_scalar("SELECT storage_path FROM stored_files WHERE id = ?")
            .bind(file_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn set_file_path(&self, file_id: i64, path: &str) {
        sqlx::query("UPDATE stored_files SET storage_path = ? WHERE id = ?")
            .bind(path)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn read_file(&self, path: &str) -> Option<String> {
        tokio::fs::read_to_string(self.storage_dir.path().join(path))
            .await
            .ok()
    }

    pub async fn userform_ids(&self, asset_uid: &str) -> Vec<String> {
        sqlx::query_scalar("SELECT userform_id FROM submissions WHERE asset_uid = ? ORDER BY id")
            .bind(asset_uid)
            .fetch_all(&self.pool)
            .await
            .unwrap()
    }

    pub async fn status_row_count(&self, transfer_id: TransferId) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM transfer_statuses WHERE transfer_id = ?")
            .bind(transfer_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
