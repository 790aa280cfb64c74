//! Host listeners attached to lifecycle events of every process built against
//! one API version.
//!
//! The API implementation of a version decides what happens when an instance
//! starts from a message, reaches an end event, or continues after waiting for
//! a message. The parser attaches these listeners without any `class` reference
//! in the model, and the host runs them with the owning plugin's diagnostic
//! context.

use std::sync::Arc;

use crate::api::ExecutionListener;

pub trait LifecycleListenerFactory: Send + Sync {
    /// API version whose processes get these listeners.
    fn api_version(&self) -> u32;

    /// Runs on `start` of message start events.
    fn start_listener(&self) -> Arc<dyn ExecutionListener>;

    /// Runs on `end` of end events, before listeners declared in the model.
    fn end_listener(&self) -> Arc<dyn ExecutionListener>;

    /// Runs on `end` of intermediate message catch events and receive tasks,
    /// before listeners declared in the model.
    fn continue_listener(&self) -> Arc<dyn ExecutionListener>;
}
