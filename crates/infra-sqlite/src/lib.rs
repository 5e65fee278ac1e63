// Ownership Infrastructure - SQLite Adapter
// Implements: TransferRepository, TransactionalTransferRepository,
// DeploymentBackend, TaskQueue

mod connection;
mod deployment;
mod error;
mod migration;
mod rows;
mod task_queue;
mod transaction;
mod transfer_repository;

pub use connection::create_pool;
pub use deployment::{userform_id, SqliteDeploymentBackend};
pub use error::map_sqlx_error;
pub use migration::run_migrations;
pub use task_queue::SqliteTaskQueue;
pub use transaction::SqliteTransferTransaction;
pub use transfer_repository::SqliteTransferRepository;

pub use sqlx::SqlitePool;

// Note: sqlx::Error conversion goes through `map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
