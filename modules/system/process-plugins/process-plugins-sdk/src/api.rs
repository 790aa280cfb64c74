//! Callback traits implemented by plugins.
//!
//! The engine never instantiates these by type name. A plugin publishes a
//! [`crate::HandlerFactory`] per implementation name and the host creates a fresh
//! handler from it for each call, passing the field configuration of the calling
//! element.

use async_trait::async_trait;

use crate::error::StepError;
use crate::execution::{Execution, UserTask};

/// Service task, send task, message end event or message intermediate throw event.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// # Errors
    ///
    /// - [`StepError::Bpmn`] to trigger an error boundary event
    /// - [`StepError::Fault`] to fail the instance
    async fn execute(&self, execution: &dyn Execution) -> Result<(), StepError>;
}

/// Listener attached to an activity or process lifecycle event.
#[async_trait]
pub trait ExecutionListener: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StepError`] if the listener fails.
    async fn notify(&self, execution: &dyn Execution) -> Result<(), StepError>;
}

/// Listener attached to a user task lifecycle event.
#[async_trait]
pub trait TaskListener: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StepError`] if the listener fails.
    async fn notify(&self, task: &dyn UserTask) -> Result<(), StepError>;
}
