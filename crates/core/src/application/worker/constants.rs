// Engine defaults (no magic values)
use std::time::Duration;

/// Sleep duration when the queue is empty (250ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(250);

/// Sleep duration after a worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Soft time limit of one async task (1 hour)
pub const DEFAULT_TASK_TIME_LIMIT: Duration = Duration::from_secs(60 * 60);

/// Memory usage above which the worker stops leasing tasks (percent)
pub const MEMORY_THROTTLE_THRESHOLD: f32 = 90.0;

/// Heartbeat age after which an IN_PROGRESS task is resumed (10 minutes)
pub const DEFAULT_RESUME_THRESHOLD_MINUTES: i64 = 10;

/// Transfer age after which its running tasks are failed (12 hours)
pub const DEFAULT_STUCK_THRESHOLD_MINUTES: i64 = 720;

/// Age after which an unanswered invite expires (14 days)
pub const DEFAULT_INVITE_EXPIRY_DAYS: i64 = 14;

/// Watchdog tick (60s)
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

/// Lease age after which a queue message is considered abandoned (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

pub const MILLIS_PER_MINUTE: i64 = 60 * 1000;
