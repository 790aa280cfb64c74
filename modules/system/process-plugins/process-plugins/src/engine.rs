//! Workflow engine operations used by the host.

use async_trait::async_trait;

use crate::domain::error::EngineError;

#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Terminates a running instance.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the instance cannot be deleted.
    async fn delete_process_instance(&self, instance_id: &str, reason: &str) -> Result<(), EngineError>;
}
