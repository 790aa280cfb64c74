//! Domain errors of the process plugins host.

use process_plugins_sdk::{CodecError, HandlerError, HandlerKind, ProcessIdentity};
use thiserror::Error;

use crate::infra::loader::{LoadError, RewriteError};

/// Handler lookup in a plugin's service container failed.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("plugin {plugin} has no handler {class_name}")]
    NotFound { plugin: String, class_name: String },

    #[error("handler {class_name} is a {actual}, expected a {expected}")]
    KindMismatch {
        class_name: String,
        expected: HandlerKind,
        actual: HandlerKind,
    },

    #[error("plugin {plugin} declares handler {class_name} twice")]
    Duplicate { plugin: String, class_name: String },

    #[error("creating handler {class_name} failed")]
    Factory {
        class_name: String,
        #[source]
        source: HandlerError,
    },
}

/// Publishing a new registry snapshot failed; the previous snapshot stays active.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("process {identity} is claimed by both {first} and {second}")]
    DuplicateIdentity {
        identity: ProcessIdentity,
        first: String,
        second: String,
    },

    #[error("plugin {name} {version} is deployed twice")]
    DuplicateModule { name: String, version: String },

    #[error("plugins {first} and {second} share the loading context name {context}")]
    DuplicateContext {
        context: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Codec(#[from] CodecRegistryError),
}

/// Process model could not be parsed or bound.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("malformed process model: {0}")]
    Xml(String),

    #[error("process model has no root element")]
    Empty,

    #[error("process element has no id")]
    MissingProcessId,

    #[error("process {process} has no version tag")]
    MissingVersionTag { process: String },

    #[error("process {process} declares invalid API version '{value}'")]
    InvalidApiVersion { process: String, value: String },

    #[error("process {identity} declares API version {declared}, plugin {plugin} implements {actual}")]
    ApiVersionMismatch {
        identity: ProcessIdentity,
        plugin: String,
        declared: u32,
        actual: u32,
    },
}

impl From<quick_xml::Error> for DefinitionError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for DefinitionError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.to_string())
    }
}

/// Serialization of a plugin-defined value failed.
#[derive(Debug, Error)]
pub enum CodecRegistryError {
    /// No deployed plugin contributed a codec for the value's type and context.
    #[error("no codec for type {type_name} in context {context}")]
    SerializationMiss { type_name: String, context: String },

    #[error("context {context} registers two codecs for {type_name}")]
    DuplicateCodec { context: String, type_name: String },

    #[error("type {type_name} cannot be loaded in context {context}")]
    Load {
        type_name: String,
        context: String,
        #[source]
        source: LoadError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// External task tracker call failed.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("task search failed: {0}")]
    Search(String),

    #[error("updating task {task_id} failed: {message}")]
    Update { task_id: String, message: String },
}

/// Workflow engine call failed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("process instance {0} not found")]
    InstanceNotFound(String),

    #[error("engine error: {0}")]
    Internal(String),
}

/// A plugin definition could not be turned into a deployable module.
#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("plugin {plugin} requires unsupported API version {api_version}")]
    UnsupportedApiVersion { plugin: String, api_version: u32 },

    #[error("plugin {plugin} declares no processes")]
    NoProcesses { plugin: String },

    #[error("plugin {plugin}: {source}")]
    Container {
        plugin: String,
        #[source]
        source: ContainerError,
    },

    #[error("plugin {plugin}: default task listener {class_name} cannot be loaded")]
    DefaultListener {
        plugin: String,
        class_name: String,
        #[source]
        source: LoadError,
    },

    #[error("plugin {plugin}: process model {file} is invalid")]
    InvalidModel {
        plugin: String,
        file: String,
        #[source]
        source: DefinitionError,
    },

    #[error("plugin {plugin}: process model {file} defines undeclared process {identity}")]
    UndeclaredProcess {
        plugin: String,
        file: String,
        identity: ProcessIdentity,
    },

    #[error("plugin {plugin}: process model {file} binds {class_name}: {source}")]
    UnboundHandler {
        plugin: String,
        file: String,
        class_name: String,
        #[source]
        source: ContainerError,
    },
}

/// Host could not be built from its configuration.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid namespace rewrite configuration")]
    Rewrite(#[from] RewriteError),

    #[error("no class source for supported API version {0}")]
    MissingApiSource(u32),

    #[error("two lifecycle listener factories for API version {0}")]
    DuplicateLifecycleListeners(u32),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
