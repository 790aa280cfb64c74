//! Host configuration.
//!
//! Layered: defaults -> YAML file (if given) -> environment (`PROCESS_PLUGINS__*`,
//! nested keys separated by `__`).

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "PROCESS_PLUGINS__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessPluginsConfig {
    pub namespace_rewrite: NamespaceRewriteConfig,
    /// API versions the host provides a class source for.
    pub supported_api_versions: Vec<u32>,
    /// Check every process model shipped by a plugin at load time.
    pub validate_models: bool,
    pub recovery: RecoveryConfig,
}

impl Default for ProcessPluginsConfig {
    fn default() -> Self {
        Self {
            namespace_rewrite: NamespaceRewriteConfig::default(),
            supported_api_versions: vec![1, 2],
            validate_models: true,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl ProcessPluginsConfig {
    /// Loads the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns [`figment::Error`] if a layer cannot be read or the merged
    /// values do not match the schema.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

/// Package rewrite applied to classes defined in plugin contexts, internal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamespaceRewriteConfig {
    pub from: String,
    pub to: String,
}

impl Default for NamespaceRewriteConfig {
    fn default() -> Self {
        Self {
            from: "org/camunda/bpm".to_owned(),
            to: "org/operaton/bpm".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Upper bound on task search pages scanned per failed instance.
    pub max_search_pages: u32,
    /// Note attached to tasks failed because their plugin is missing.
    pub plugin_missing_note: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_search_pages: 100,
            plugin_missing_note: "Plugin for process not found, unable to continue execution"
                .to_owned(),
        }
    }
}
