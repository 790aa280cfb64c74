//! Process Plugins SDK
//!
//! This crate is the stable API that process plugins are built against:
//!
//! - [`ProcessIdentity`] - `(process id, version)` key of a deployed process definition
//! - [`StepHandler`], [`TaskListener`], [`ExecutionListener`] - engine callbacks a plugin implements
//! - [`Execution`], [`UserTask`] - handles the engine passes into those callbacks
//! - [`BindingConfig`] - static field configuration captured from the process model
//! - [`HandlerFactory`] - name -> factory table a plugin publishes instead of reflective lookup
//! - [`ValueCodec`] - (de)serializer for plugin-defined variable types
//! - [`ClassSource`] - access to the plugin's compiled class units
//! - [`ProcessPluginDefinition`] - everything the host needs to deploy a plugin
//! - [`LifecycleListenerFactory`] - host listeners an API version attaches to lifecycle events
//!
//! ## Usage
//!
//! ```ignore
//! struct MyPlugin;
//!
//! impl ProcessPluginDefinition for MyPlugin {
//!     fn name(&self) -> &str { "my-plugin" }
//!     fn version(&self) -> &str { "1.0.0" }
//!     fn api_version(&self) -> u32 { 2 }
//!     // ...
//! }
//!
//! inventory::submit! {
//!     PluginRegistration::new(|| std::sync::Arc::new(MyPlugin))
//! }
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod api;
pub mod binding;
pub mod codec;
pub mod definition;
pub mod error;
pub mod execution;
pub mod identity;
pub mod lifecycle;
pub mod source;

// Re-export main types at crate root for convenience
pub use api::{ExecutionListener, StepHandler, TaskListener};
pub use binding::{BindingConfig, FieldValue};
pub use codec::{AnyValue, JsonCodec, ValueCodec};
pub use definition::{
    HandlerFactory, HandlerKind, PluginRegistration, ProcessPluginDefinition, registered_plugins,
};
pub use error::{CodecError, HandlerError, StepError};
pub use execution::{Execution, UserTask};
pub use identity::ProcessIdentity;
pub use lifecycle::LifecycleListenerFactory;
pub use source::{ClassSource, MemoryClassSource};
