// Panic isolation for worker safety
use std::any::Any;
use tokio::task::JoinError;

/// How a spawned task ended without returning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortKind {
    /// The task body panicked: a logical failure
    Panicked(String),
    /// The task was cancelled from outside: an interruption
    Cancelled,
}

/// Classify the `JoinError` of a task spawned for panic isolation
pub fn classify_join_error(err: JoinError) -> AbortKind {
    if err.is_panic() {
        AbortKind::Panicked(panic_message(err.into_panic().as_ref()))
    } else {
        AbortKind::Cancelled
    }
}

/// Extract the message of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
