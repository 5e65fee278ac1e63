//! Ownership Engine - Main Entry Point
//! Worker + Watchdog over one SQLite database

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use ownership_core::application::shutdown_channel;
use ownership_daemon::{logging, Engine, Settings};
use ownership_infra_system::SystemProbeImpl;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration, then logging (log settings live in the config)
    let settings = Settings::load().context("Failed to load configuration")?;
    let _log_guard = logging::init(&settings)?;

    info!("Ownership Engine v{} starting...", VERSION);

    // 2. Database + DI wiring
    let engine = Engine::connect(settings).await?;

    // 3. Crash recovery: messages leased by a dead worker go back to the queue
    info!("Running crash recovery...");
    match engine.recovery.requeue_abandoned().await {
        Ok(count) => info!(requeued_tasks = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 4. Worker (task processing loop)
    info!("Starting worker...");
    let worker = engine.worker(Arc::new(SystemProbeImpl::new()));
    let worker_shutdown = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(worker_shutdown).await {
            error!(error = ?e, "Worker failed");
        }
    });

    // 5. Watchdog (periodic sweeps)
    info!(
        interval_secs = engine.settings.watchdog_interval_secs,
        resume_threshold_minutes = engine.settings.resume_threshold_minutes,
        stuck_threshold_minutes = engine.settings.stuck_threshold_minutes,
        "Starting watchdog..."
    );
    let watchdog = Arc::clone(&engine.watchdog);
    let watchdog_handle = tokio::spawn(async move {
        watchdog.run(shutdown_rx).await;
    });

    info!("System ready. Waiting for tasks...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: a task still running past the grace period is
    //    left IN_PROGRESS and resumed by the next watchdog sweep
    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, worker_handle).await;
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, watchdog_handle).await;
    engine.pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
