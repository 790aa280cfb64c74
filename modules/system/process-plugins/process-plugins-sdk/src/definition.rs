//! Plugin definition contract and handler factories.

use std::fmt;
use std::sync::Arc;

use crate::api::{ExecutionListener, StepHandler, TaskListener};
use crate::binding::BindingConfig;
use crate::codec::ValueCodec;
use crate::error::HandlerError;
use crate::identity::ProcessIdentity;
use crate::source::ClassSource;

type StepFactory = dyn Fn(&BindingConfig) -> Result<Arc<dyn StepHandler>, HandlerError> + Send + Sync;
type ExecutionListenerFactory =
    dyn Fn(&BindingConfig) -> Result<Arc<dyn ExecutionListener>, HandlerError> + Send + Sync;
type TaskListenerFactory =
    dyn Fn(&BindingConfig) -> Result<Arc<dyn TaskListener>, HandlerError> + Send + Sync;

/// Kind of handler a factory produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Step,
    ExecutionListener,
    TaskListener,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandlerKind::Step => "step",
            HandlerKind::ExecutionListener => "execution listener",
            HandlerKind::TaskListener => "task listener",
        };
        f.write_str(s)
    }
}

/// Creates a configured handler for one implementation class name.
#[derive(Clone)]
pub enum HandlerFactory {
    Step(Arc<StepFactory>),
    ExecutionListener(Arc<ExecutionListenerFactory>),
    TaskListener(Arc<TaskListenerFactory>),
}

impl HandlerFactory {
    pub fn step<F>(f: F) -> Self
    where
        F: Fn(&BindingConfig) -> Result<Arc<dyn StepHandler>, HandlerError> + Send + Sync + 'static,
    {
        Self::Step(Arc::new(f))
    }

    pub fn execution_listener<F>(f: F) -> Self
    where
        F: Fn(&BindingConfig) -> Result<Arc<dyn ExecutionListener>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self::ExecutionListener(Arc::new(f))
    }

    pub fn task_listener<F>(f: F) -> Self
    where
        F: Fn(&BindingConfig) -> Result<Arc<dyn TaskListener>, HandlerError> + Send + Sync + 'static,
    {
        Self::TaskListener(Arc::new(f))
    }

    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        match self {
            HandlerFactory::Step(_) => HandlerKind::Step,
            HandlerFactory::ExecutionListener(_) => HandlerKind::ExecutionListener,
            HandlerFactory::TaskListener(_) => HandlerKind::TaskListener,
        }
    }
}

impl fmt::Debug for HandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerFactory").field(&self.kind()).finish()
    }
}

/// Everything the host needs to deploy a process plugin.
///
/// Handler names are the fully qualified implementation class names referenced
/// by `class` attributes in the plugin's process models.
pub trait ProcessPluginDefinition: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Version of the host API the plugin was built against.
    fn api_version(&self) -> u32;

    /// Process definitions this plugin owns.
    fn process_identities(&self) -> Vec<ProcessIdentity>;

    /// Class every `create` task listener must be, or extend.
    fn default_task_listener_class(&self) -> &str;

    /// Handler factories keyed by implementation class name.
    fn handlers(&self) -> Vec<(String, HandlerFactory)>;

    /// Codecs for variable types defined by this plugin.
    fn value_codecs(&self) -> Vec<Arc<dyn ValueCodec>> {
        Vec::new()
    }

    /// Compiled class units of the plugin.
    fn class_source(&self) -> Arc<dyn ClassSource>;

    /// BPMN models shipped with the plugin, as `(file name, xml)`.
    fn process_models(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Link-time registration of a plugin definition.
///
/// ```ignore
/// inventory::submit! {
///     PluginRegistration::new(|| std::sync::Arc::new(MyPlugin))
/// }
/// ```
pub struct PluginRegistration {
    create: fn() -> Arc<dyn ProcessPluginDefinition>,
}

impl PluginRegistration {
    #[must_use]
    pub const fn new(create: fn() -> Arc<dyn ProcessPluginDefinition>) -> Self {
        Self { create }
    }

    #[must_use]
    pub fn create(&self) -> Arc<dyn ProcessPluginDefinition> {
        (self.create)()
    }
}

inventory::collect!(PluginRegistration);

/// All plugin definitions registered with [`inventory::submit!`] in the current binary.
#[must_use]
pub fn registered_plugins() -> Vec<Arc<dyn ProcessPluginDefinition>> {
    inventory::iter::<PluginRegistration>
        .into_iter()
        .map(PluginRegistration::create)
        .collect()
}
