//! Handles the engine passes into plugin callbacks.

/// A running workflow instance positioned at the activity that invoked the callback.
pub trait Execution: Send + Sync {
    fn process_instance_id(&self) -> &str;

    /// Business key of the instance, used to correlate externally tracked tasks.
    fn business_key(&self) -> Option<&str>;

    /// Id of the BPMN element currently executing.
    fn activity_id(&self) -> &str;

    fn variable(&self, name: &str) -> Option<serde_json::Value>;

    fn set_variable(&self, name: &str, value: serde_json::Value);
}

/// A user task for which a task listener is notified.
pub trait UserTask: Send + Sync {
    fn task_id(&self) -> &str;

    /// Lifecycle event that triggered the notification, e.g. `create`.
    fn event_name(&self) -> &str;

    /// The execution the task belongs to.
    fn execution(&self) -> &dyn Execution;
}
