// Port Layer - Interfaces for external dependencies

pub mod deployment;
pub mod file_storage;
pub mod id_provider; // For deterministic testing
pub mod system_probe;
pub mod task_queue;
pub mod time_provider;
pub mod transaction;
pub mod transfer_repository;

// Re-exports
pub use deployment::{DeploymentBackend, RewriteOutcome};
pub use file_storage::{FileStorage, StorageError};
pub use id_provider::IdProvider;
pub use system_probe::{SystemMetrics, SystemProbe};
pub use task_queue::{QueuedTask, TaskQueue};
pub use time_provider::TimeProvider;
pub use transaction::{Transaction, TransactionalTransferRepository, TransferTransaction};
pub use transfer_repository::{TaskSnapshot, TransferRepository};
