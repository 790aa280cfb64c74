//! Failure path for calls that cannot be completed.
//!
//! Every in-progress task of the instance is marked failed with an explanatory
//! note, then the instance is terminated. Task updates are best-effort: each
//! failure is logged and skipped, and termination always follows.

use std::sync::Arc;

use process_plugins_sdk::{Execution, ProcessIdentity};
use tracing::{debug, error, warn};

use super::router::DelegateOutcome;
use crate::config::RecoveryConfig;
use crate::engine::ProcessEngine;
use crate::tracker::{TaskStatus, TaskTracker};

#[derive(Clone)]
pub struct RecoveryPath {
    tracker: Arc<dyn TaskTracker>,
    engine: Arc<dyn ProcessEngine>,
    config: RecoveryConfig,
}

impl RecoveryPath {
    #[must_use]
    pub fn new(
        tracker: Arc<dyn TaskTracker>,
        engine: Arc<dyn ProcessEngine>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            tracker,
            engine,
            config,
        }
    }

    /// No deployed plugin owns the instance's process.
    pub async fn plugin_missing(
        &self,
        identity: &ProcessIdentity,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        warn!(
            process = %identity,
            instance = execution.process_instance_id(),
            business_key = execution.business_key(),
            "Plugin for process not found, unable to continue execution of instance, updating tasks to status 'failed'"
        );
        let reason = format!("Plugin for process {identity} not found");
        self.fail_instance(execution, &self.config.plugin_missing_note, reason)
            .await
    }

    /// The owning plugin's handler could not be created or failed.
    pub async fn handler_failed(
        &self,
        identity: &ProcessIdentity,
        class_name: &str,
        execution: &dyn Execution,
        message: &str,
    ) -> DelegateOutcome {
        error!(
            process = %identity,
            instance = execution.process_instance_id(),
            activity = execution.activity_id(),
            class = class_name,
            error = message,
            "Process plugin handler failed, terminating instance"
        );
        let reason = format!("Handler {class_name} failed: {message}");
        self.fail_instance(execution, message, reason).await
    }

    async fn fail_instance(
        &self,
        execution: &dyn Execution,
        note: &str,
        reason: String,
    ) -> DelegateOutcome {
        let failed = self.fail_in_progress_tasks(execution.business_key(), note).await;
        debug!(
            instance = execution.process_instance_id(),
            failed, "Marked in-progress tasks as failed"
        );

        if let Err(e) = self
            .engine
            .delete_process_instance(execution.process_instance_id(), &reason)
            .await
        {
            error!(
                instance = execution.process_instance_id(),
                error = %e,
                "Unable to terminate process instance"
            );
        }
        DelegateOutcome::Terminated { reason }
    }

    /// Returns the number of tasks successfully marked failed.
    async fn fail_in_progress_tasks(&self, business_key: Option<&str>, note: &str) -> usize {
        // Tasks are correlated by business key only.
        let Some(business_key) = business_key else {
            return 0;
        };

        let mut failed = 0;
        let mut page = 1;
        loop {
            let result = match self.tracker.search_in_progress(page).await {
                Ok(result) => result,
                Err(e) => {
                    error!(page, error = %e, "Unable to search in-progress tasks");
                    return failed;
                }
            };

            for task in result
                .tasks
                .iter()
                .filter(|t| t.business_key.as_deref() == Some(business_key))
            {
                match self
                    .tracker
                    .update_task_status(&task.id, TaskStatus::Failed, note)
                    .await
                {
                    Ok(()) => failed += 1,
                    Err(e) => error!(
                        task_id = %task.id,
                        error = %e,
                        "Unable to update Task (status failed)"
                    ),
                }
            }

            if !result.has_next {
                return failed;
            }
            if page >= self.config.max_search_pages {
                warn!(
                    pages = page,
                    "In-progress task search truncated at configured page limit"
                );
                return failed;
            }
            page += 1;
        }
    }
}
