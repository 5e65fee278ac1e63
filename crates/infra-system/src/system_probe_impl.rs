// System probe implementation
// reason: sysinfo for cross-platform system monitoring
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

use ownership_core::port::system_probe::{SystemMetrics, SystemProbe};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// System probe implementation using sysinfo
///
/// Only CPU and memory are refreshed; the worker throttles on memory.
pub struct SystemProbeImpl {
    system: Arc<Mutex<System>>,
}

impl SystemProbeImpl {
    /// Create a new system probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = SystemProbeImpl::new();
    /// ```
    pub fn new() -> Self {
        let refresh = RefreshKind::new()
            .with_cpu(CpuRefreshKind::new().with_cpu_usage())
            .with_memory(MemoryRefreshKind::new().with_ram());
        Self {
            system: Arc::new(Mutex::new(System::new_with_specifics(refresh))),
        }
    }
}

impl Default for SystemProbeImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for SystemProbeImpl {
    async fn get_metrics(&self) -> SystemMetrics {
        // A poisoned lock still holds a usable System
        let mut sys = match self.system.lock() {
            Ok(sys) => sys,
            Err(poisoned) => poisoned.into_inner(),
        };

        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_usage_percent = sys.global_cpu_info().cpu_usage();
        let memory_used_mb = sys.used_memory() / BYTES_PER_MB;
        let memory_total_mb = sys.total_memory() / BYTES_PER_MB;

        debug!(
            cpu = %cpu_usage_percent,
            mem_used_mb = %memory_used_mb,
            mem_total_mb = %memory_total_mb,
            "System metrics collected"
        );

        SystemMetrics {
            cpu_usage_percent,
            memory_used_mb,
            memory_total_mb,
        }
    }
}
