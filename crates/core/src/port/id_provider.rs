// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic uids in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique uid starting with `prefix`
    fn generate_uid(&self, prefix: &str) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_uid(&self, prefix: &str) -> String {
        format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
    }
}

/// Counter-based provider: `poi1`, `pot2`, ...
#[derive(Default)]
pub struct SequentialIdProvider {
    counter: std::sync::atomic::AtomicU64,
}

impl IdProvider for SequentialIdProvider {
    fn generate_uid(&self, prefix: &str) -> String {
        let next = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        format!("{}{}", prefix, next)
    }
}
