//! Process identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a deployed process definition by its id and version tag.
///
/// Every running instance carries the identity of the definition it was started
/// from; the host uses it to find the plugin that owns the instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessIdentity {
    process_id: String,
    version: String,
}

impl ProcessIdentity {
    #[must_use]
    pub fn new(process_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            version: version.into(),
        }
    }

    #[must_use]
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.process_id, self.version)
    }
}
