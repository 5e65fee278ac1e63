// Ownership Infrastructure - System Adapters
// Implements: FileStorage (local filesystem), SystemProbe

pub mod local_storage;
pub mod system_probe_impl;

pub use local_storage::LocalFileStorage;
pub use system_probe_impl::SystemProbeImpl;
