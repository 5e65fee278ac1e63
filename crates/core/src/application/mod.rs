// Application Layer - Use Cases and Business Logic

pub mod invite;
pub mod recovery;
pub mod tasks;
pub mod transfer;
pub mod watchdog;
pub mod worker;

// Re-exports
pub use invite::{CreateInviteRequest, InviteDetails, InviteService};
pub use recovery::RecoveryService;
pub use tasks::{TaskFailure, TaskHook, TaskHooks, TaskOutcome, TaskRunner, TaskRunnerConfig};
pub use transfer::{StatusWriter, TransferService};
pub use watchdog::{classify, SweepAction, SweepReport, Watchdog, WatchdogConfig};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerConfig};
