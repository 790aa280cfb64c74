//! Host lifecycle listeners, one set per API version.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use process_plugins_sdk::{ExecutionListener, LifecycleListenerFactory};
use serde::{Deserialize, Serialize};

use super::error::HostError;

/// Lifecycle listener the parser attached to an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleListener {
    /// Message start event.
    Start,
    /// End event.
    End,
    /// Intermediate message catch event or receive task.
    Continue,
}

impl LifecycleListener {
    /// Execution event the listener runs on.
    #[must_use]
    pub fn event(self) -> &'static str {
        match self {
            LifecycleListener::Start => "start",
            LifecycleListener::End | LifecycleListener::Continue => "end",
        }
    }
}

impl fmt::Display for LifecycleListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleListener::Start => f.write_str("start listener"),
            LifecycleListener::End => f.write_str("end listener"),
            LifecycleListener::Continue => f.write_str("continue listener"),
        }
    }
}

#[derive(Clone, Default)]
pub struct LifecycleListeners {
    by_api_version: Arc<HashMap<u32, Arc<dyn LifecycleListenerFactory>>>,
}

impl LifecycleListeners {
    /// # Errors
    ///
    /// Returns [`HostError::DuplicateLifecycleListeners`] if two factories serve
    /// the same API version.
    pub fn new(factories: Vec<Arc<dyn LifecycleListenerFactory>>) -> Result<Self, HostError> {
        let mut by_api_version = HashMap::with_capacity(factories.len());
        for factory in factories {
            match by_api_version.entry(factory.api_version()) {
                Entry::Occupied(existing) => {
                    return Err(HostError::DuplicateLifecycleListeners(*existing.key()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(factory);
                }
            }
        }
        Ok(Self {
            by_api_version: Arc::new(by_api_version),
        })
    }

    #[must_use]
    pub fn supports(&self, api_version: u32) -> bool {
        self.by_api_version.contains_key(&api_version)
    }

    #[must_use]
    pub fn listener(
        &self,
        api_version: u32,
        kind: LifecycleListener,
    ) -> Option<Arc<dyn ExecutionListener>> {
        let factory = self.by_api_version.get(&api_version)?;
        Some(match kind {
            LifecycleListener::Start => factory.start_listener(),
            LifecycleListener::End => factory.end_listener(),
            LifecycleListener::Continue => factory.continue_listener(),
        })
    }
}

impl fmt::Debug for LifecycleListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut versions: Vec<u32> = self.by_api_version.keys().copied().collect();
        versions.sort_unstable();
        f.debug_struct("LifecycleListeners")
            .field("api_versions", &versions)
            .finish()
    }
}
