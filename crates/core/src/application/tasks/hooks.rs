// Task failure callbacks, registered when the runner is built

use super::TaskFailure;
use crate::domain::{StatusType, TaskMessage};
use std::sync::Arc;

/// Callback invoked with the failed message and its classified failure
pub type TaskHook = Arc<dyn Fn(&TaskMessage, &TaskFailure) + Send + Sync>;

/// Registered callbacks, each optionally limited to one task type
#[derive(Clone, Default)]
pub struct TaskHooks {
    on_failure: Vec<(Option<StatusType>, TaskHook)>,
    on_interrupted: Vec<(Option<StatusType>, TaskHook)>,
}

impl TaskHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a task was marked FAILED (`None` = every task type)
    pub fn on_failure<F>(mut self, task_type: Option<StatusType>, handler: F) -> Self
    where
        F: Fn(&TaskMessage, &TaskFailure) + Send + Sync + 'static,
    {
        self.on_failure.push((task_type, Arc::new(handler)));
        self
    }

    /// Called after an interrupted task was left IN_PROGRESS for the watchdog
    pub fn on_interrupted<F>(mut self, task_type: Option<StatusType>, handler: F) -> Self
    where
        F: Fn(&TaskMessage, &TaskFailure) + Send + Sync + 'static,
    {
        self.on_interrupted.push((task_type, Arc::new(handler)));
        self
    }

    pub(crate) fn notify(&self, message: &TaskMessage, failure: &TaskFailure) {
        let hooks = match failure {
            TaskFailure::Interrupted(_) => &self.on_interrupted,
            TaskFailure::Logical(_) => &self.on_failure,
        };
        hooks
            .iter()
            .filter(|(task_type, _)| task_type.map_or(true, |t| t == message.task_type))
            .for_each(|(_, hook)| hook(message, failure));
    }
}
