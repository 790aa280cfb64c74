//! Deployed plugin descriptor.

use std::fmt;
use std::sync::Arc;

use process_plugins_sdk::{ProcessIdentity, ValueCodec};

use super::container::ServiceContainer;
use crate::infra::loader::LoadingContext;

/// A plugin as deployed into the host.
///
/// Created once per deployment and never mutated; a redeployment builds a new
/// descriptor. Calls that resolved an older descriptor keep using it.
pub struct ModuleDescriptor {
    name: String,
    version: String,
    api_version: u32,
    context: Arc<LoadingContext>,
    container: Arc<ServiceContainer>,
    identities: Vec<ProcessIdentity>,
    default_task_listener_class: String,
    codecs: Vec<Arc<dyn ValueCodec>>,
}

impl ModuleDescriptor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        api_version: u32,
        context: Arc<LoadingContext>,
        container: ServiceContainer,
        identities: Vec<ProcessIdentity>,
        default_task_listener_class: impl Into<String>,
        codecs: Vec<Arc<dyn ValueCodec>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            api_version,
            context,
            container: Arc::new(container),
            identities,
            default_task_listener_class: default_task_listener_class.into(),
            codecs,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Isolated loading context owning all classes of the plugin.
    #[must_use]
    pub fn context(&self) -> &Arc<LoadingContext> {
        &self.context
    }

    #[must_use]
    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    #[must_use]
    pub fn identities(&self) -> &[ProcessIdentity] {
        &self.identities
    }

    /// Copy sharing this plugin's context, handlers and codecs that owns only
    /// the identities `keep` accepts.
    #[must_use]
    pub fn narrowed(&self, keep: impl Fn(&ProcessIdentity) -> bool) -> Self {
        Self {
            name: self.name.clone(),
            version: self.version.clone(),
            api_version: self.api_version,
            context: Arc::clone(&self.context),
            container: Arc::clone(&self.container),
            identities: self.identities.iter().filter(|id| keep(id)).cloned().collect(),
            default_task_listener_class: self.default_task_listener_class.clone(),
            codecs: self.codecs.clone(),
        }
    }

    #[must_use]
    pub fn owns(&self, identity: &ProcessIdentity) -> bool {
        self.identities.contains(identity)
    }

    #[must_use]
    pub fn default_task_listener_class(&self) -> &str {
        &self.default_task_listener_class
    }

    #[must_use]
    pub fn codecs(&self) -> &[Arc<dyn ValueCodec>] {
        &self.codecs
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("api_version", &self.api_version)
            .field("context", &self.context.name())
            .field("identities", &self.identities)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
