//! Parsed process definitions and invocation bindings.

use std::fmt;

use process_plugins_sdk::{BindingConfig, HandlerKind, ProcessIdentity};
use serde::{Deserialize, Serialize};

use crate::domain::lifecycle::LifecycleListener;

/// Element kind a binding was recorded for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "event")]
pub enum BindingKind {
    ServiceTask,
    SendTask,
    MessageEndEvent,
    MessageIntermediateThrowEvent,
    TaskListener(String),
    ExecutionListener(String),
}

impl BindingKind {
    /// Handler kind the bound class must provide.
    #[must_use]
    pub fn handler_kind(&self) -> HandlerKind {
        match self {
            BindingKind::ServiceTask
            | BindingKind::SendTask
            | BindingKind::MessageEndEvent
            | BindingKind::MessageIntermediateThrowEvent => HandlerKind::Step,
            BindingKind::TaskListener(_) => HandlerKind::TaskListener,
            BindingKind::ExecutionListener(_) => HandlerKind::ExecutionListener,
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::ServiceTask => f.write_str("service task"),
            BindingKind::SendTask => f.write_str("send task"),
            BindingKind::MessageEndEvent => f.write_str("message end event"),
            BindingKind::MessageIntermediateThrowEvent => {
                f.write_str("message intermediate throw event")
            }
            BindingKind::TaskListener(event) => write!(f, "task listener ({event})"),
            BindingKind::ExecutionListener(event) => write!(f, "execution listener ({event})"),
        }
    }
}

/// Deferred reference to a plugin handler, resolved through the registry per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationBinding {
    kind: BindingKind,
    class_name: String,
    config: BindingConfig,
}

impl InvocationBinding {
    #[must_use]
    pub fn new(kind: BindingKind, class_name: impl Into<String>, config: BindingConfig) -> Self {
        Self {
            kind,
            class_name: class_name.into(),
            config,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }
}

/// A flow element carrying at least one binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedActivity {
    pub id: String,
    /// Local element name, e.g. `serviceTask`.
    pub element: String,
    pub behavior: Option<InvocationBinding>,
    pub task_listeners: Vec<InvocationBinding>,
    pub execution_listeners: Vec<InvocationBinding>,
    /// Host listener of the process API version. Runs before the declared
    /// execution listeners of the same event.
    pub lifecycle_listener: Option<LifecycleListener>,
    /// Whether the plugin's default task listener was added by the parser.
    pub default_listener_added: bool,
}

impl ParsedActivity {
    pub(crate) fn new(id: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element: element.into(),
            behavior: None,
            task_listeners: Vec::new(),
            execution_listeners: Vec::new(),
            lifecycle_listener: None,
            default_listener_added: false,
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.behavior.is_some()
            || !self.task_listeners.is_empty()
            || !self.execution_listeners.is_empty()
            || self.lifecycle_listener.is_some()
    }

    /// All bindings of the activity.
    pub fn bindings(&self) -> impl Iterator<Item = &InvocationBinding> {
        self.behavior
            .iter()
            .chain(&self.task_listeners)
            .chain(&self.execution_listeners)
    }
}

/// A process definition bound to its owning plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedProcess {
    pub identity: ProcessIdentity,
    /// API version declared by the model, if any.
    pub api_version: Option<u32>,
    /// Plugin owning the identity at parse time.
    pub plugin: Option<String>,
    pub execution_listeners: Vec<InvocationBinding>,
    pub activities: Vec<ParsedActivity>,
}

impl ParsedProcess {
    #[must_use]
    pub fn activity(&self, id: &str) -> Option<&ParsedActivity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// All bindings of the process and its activities.
    pub fn bindings(&self) -> impl Iterator<Item = &InvocationBinding> {
        self.execution_listeners
            .iter()
            .chain(self.activities.iter().flat_map(ParsedActivity::bindings))
    }
}
