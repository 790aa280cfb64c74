//! Plugin-attributed diagnostic context.
//!
//! Router-mediated calls run inside a task-local context naming the plugin and
//! the process instance, plus a `tracing` span carrying the same fields. The
//! context is gone as soon as the scoped call returns, panics or is dropped.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use process_plugins_sdk::{Execution, ProcessIdentity};
use tracing::Instrument;

use super::descriptor::ModuleDescriptor;

pub const PLUGIN_API: &str = "plugin.api";
pub const PLUGIN_NAME: &str = "plugin.name";
pub const PLUGIN_VERSION: &str = "plugin.version";
pub const PROCESS: &str = "process";
pub const PROCESS_INSTANCE: &str = "process.instance";
pub const PROCESS_BUSINESS_KEY: &str = "process.business_key";
pub const PROCESS_ACTIVITY: &str = "process.activity";

tokio::task_local! {
    static DIAGNOSTIC_CONTEXT: Arc<DiagnosticContext>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticContext {
    entries: BTreeMap<&'static str, String>,
}

impl DiagnosticContext {
    #[must_use]
    pub fn for_module(module: &ModuleDescriptor) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PLUGIN_API, module.api_version().to_string());
        entries.insert(PLUGIN_NAME, module.name().to_owned());
        entries.insert(PLUGIN_VERSION, module.version().to_owned());
        Self { entries }
    }

    #[must_use]
    pub fn with_process(mut self, identity: &ProcessIdentity) -> Self {
        self.entries.insert(PROCESS, identity.to_string());
        self
    }

    #[must_use]
    pub fn with_execution(mut self, execution: &dyn Execution) -> Self {
        self.entries
            .insert(PROCESS_INSTANCE, execution.process_instance_id().to_owned());
        if let Some(business_key) = execution.business_key() {
            self.entries
                .insert(PROCESS_BUSINESS_KEY, business_key.to_owned());
        }
        self.entries
            .insert(PROCESS_ACTIVITY, execution.activity_id().to_owned());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Context of the call currently running on this task, if any.
    #[must_use]
    pub fn current() -> Option<Arc<DiagnosticContext>> {
        DIAGNOSTIC_CONTEXT.try_with(Arc::clone).ok()
    }

    /// Runs `fut` with this context installed.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        let span = self.span();
        DIAGNOSTIC_CONTEXT
            .scope(Arc::new(self), fut.instrument(span))
            .await
    }

    /// Runs `f` with this context installed, for synchronous callers.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        let span = self.span();
        let _entered = span.enter();
        DIAGNOSTIC_CONTEXT.sync_scope(Arc::new(self), f)
    }

    fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "process_plugin",
            plugin.api = self.get(PLUGIN_API),
            plugin.name = self.get(PLUGIN_NAME),
            plugin.version = self.get(PLUGIN_VERSION),
            process = self.get(PROCESS),
            process.instance = self.get(PROCESS_INSTANCE),
            process.business_key = self.get(PROCESS_BUSINESS_KEY),
            process.activity = self.get(PROCESS_ACTIVITY),
        )
    }
}
