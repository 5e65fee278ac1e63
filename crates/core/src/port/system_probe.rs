// System resource monitoring port
use async_trait::async_trait;

/// System resource metrics
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

impl SystemMetrics {
    /// Memory in use, 0.0 - 100.0 (0.0 when the total is unknown)
    pub fn memory_usage_percent(&self) -> f32 {
        if self.memory_total_mb == 0 {
            return 0.0;
        }
        (self.memory_used_mb as f64 / self.memory_total_mb as f64 * 100.0) as f32
    }
}

/// System probe port for resource monitoring
///
/// Used by the worker to stop leasing tasks under memory pressure, where a
/// running file move would likely be killed.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Get current system metrics
    ///
    /// # Example
    /// ```text
    /// let metrics = probe.get_metrics().await;
    /// if metrics.memory_usage_percent() > 90.0 {
    ///     println!("Memory throttling triggered");
    /// }
    /// ```
    async fn get_metrics(&self) -> SystemMetrics;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    /// Mock SystemProbe for testing
    pub struct MockSystemProbe {
        metrics: Arc<Mutex<SystemMetrics>>,
    }
    impl MockSystemProbe {
        pub fn new(memory_usage_percent: f32) -> Self {
            Self {
                metrics: Arc::new(Mutex::new(SystemMetrics {
                    cpu_usage_percent: 10.0,
                    memory_used_mb: (memory_usage_percent * 10.0) as u64,
                    memory_total_mb: 1000,
                })),
            }
        }
        pub fn set_memory_usage(&self, memory_usage_percent: f32) {
            if let Ok(mut metrics) = self.metrics.lock() {
                metrics.memory_used_mb = (memory_usage_percent * 10.0) as u64;
            }
        }
    }
    #[async_trait]
    impl SystemProbe for MockSystemProbe {
        async fn get_metrics(&self) -> SystemMetrics {
            match self.metrics.lock() {
                Ok(metrics) => metrics.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }
    }
}
