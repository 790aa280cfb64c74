//! External task tracker used by the recovery path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Requested,
    InProgress,
    Completed,
    Failed,
}

/// Task record as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTask {
    pub id: String,
    pub status: TaskStatus,
    pub business_key: Option<String>,
}

/// One page of a task search, pages are numbered from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<TrackedTask>,
    pub has_next: bool,
}

/// Tracker holding externally visible task records, e.g. a FHIR server.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Tasks with status in-progress, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Search`] if the tracker cannot be queried.
    async fn search_in_progress(&self, page: u32) -> Result<TaskPage, TrackerError>;

    /// # Errors
    ///
    /// Returns [`TrackerError::Update`] if the task cannot be updated.
    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        note: &str,
    ) -> Result<(), TrackerError>;
}
