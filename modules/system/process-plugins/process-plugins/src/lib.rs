//! Process Plugins Host
//!
//! Hosts independently built, versioned process plugins inside one workflow
//! engine process. The public plugin API lives in `process-plugins-sdk` and is
//! re-exported here.
//!
//! ## Architecture
//!
//! - **Isolated loading**: each plugin's class units are defined in their own
//!   [`LoadingContext`], with references to the legacy engine namespace rewritten
//!   on load. Identically named types of two plugins are distinct types.
//! - **Registry snapshots**: process identity -> plugin mappings are published as
//!   immutable snapshots behind an atomic pointer; readers never lock.
//! - **Deferred binding**: [`DefinitionParsingInterceptor`] records handler class
//!   names at parse time, [`DelegateRouter`] resolves them per call and fails the
//!   instance through the recovery path when that is impossible.
//! - **Diagnostics**: every routed call runs in a task-local
//!   [`DiagnosticContext`] naming plugin and instance.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === PUBLIC API (from SDK) ===
pub use process_plugins_sdk::{
    AnyValue, BindingConfig, ClassSource, CodecError, Execution, ExecutionListener, FieldValue,
    HandlerError, HandlerFactory, HandlerKind, JsonCodec, LifecycleListenerFactory,
    MemoryClassSource, PluginRegistration, ProcessIdentity, ProcessPluginDefinition, StepError,
    StepHandler, TaskListener, UserTask, ValueCodec,
};

// === HOST FACADE ===
pub mod module;
pub use module::ProcessPluginsHost;

// === CONFIGURATION ===
pub mod config;
pub use config::{NamespaceRewriteConfig, ProcessPluginsConfig, RecoveryConfig};

// === EXTERNAL COLLABORATORS ===
pub mod engine;
pub mod tracker;
pub use engine::ProcessEngine;
pub use tracker::{TaskPage, TaskStatus, TaskTracker, TrackedTask};

pub mod plugin_loader;
pub use plugin_loader::ProcessPluginLoader;

// === INTERNAL MODULES ===
pub mod domain;
pub mod infra;

pub use domain::codec::{CrossModuleValueCodec, ObjectValue, StoredValue};
pub use domain::definition::{
    BindingKind, DefinitionParsingInterceptor, InvocationBinding, ParsedActivity, ParsedProcess,
};
pub use domain::descriptor::ModuleDescriptor;
pub use domain::diagnostics::DiagnosticContext;
pub use domain::lifecycle::{LifecycleListener, LifecycleListeners};
pub use domain::error::{
    CodecRegistryError, ContainerError, DefinitionError, EngineError, HostError, PluginLoadError,
    RegistryError, TrackerError,
};
pub use domain::registry::{ModuleRegistry, RegistrySnapshot};
pub use domain::router::{DelegateOutcome, DelegateRouter};
pub use infra::loader::{
    ArchiveClassSource, DefinedType, DirectoryClassSource, LoadError, LoadingContext,
    NamespaceRewriter, RewriteStats,
};
