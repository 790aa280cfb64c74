//! Turns plugin definitions into deployable module descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use process_plugins_sdk::{HandlerKind, ProcessPluginDefinition};
use tracing::{debug, error, info};

use crate::domain::container::ServiceContainer;
use crate::domain::definition::DefinitionParsingInterceptor;
use crate::domain::descriptor::ModuleDescriptor;
use crate::domain::error::PluginLoadError;
use crate::infra::loader::{LoadingContext, NamespaceRewriter};

pub struct ProcessPluginLoader {
    api_contexts: HashMap<u32, Arc<LoadingContext>>,
    rewriter: Arc<NamespaceRewriter>,
    interceptor: DefinitionParsingInterceptor,
    validate_models: bool,
}

impl ProcessPluginLoader {
    /// `api_contexts` holds one host API context per supported API version.
    #[must_use]
    pub fn new(
        api_contexts: HashMap<u32, Arc<LoadingContext>>,
        rewriter: Arc<NamespaceRewriter>,
        interceptor: DefinitionParsingInterceptor,
        validate_models: bool,
    ) -> Self {
        Self {
            api_contexts,
            rewriter,
            interceptor,
            validate_models,
        }
    }

    /// Loads one plugin into a fresh isolated context.
    ///
    /// # Errors
    ///
    /// Returns [`PluginLoadError`] if the plugin targets an unsupported API
    /// version, declares no processes, has an inconsistent handler table, its
    /// default task listener cannot be loaded, or one of its process models is
    /// invalid.
    pub fn load(
        &self,
        definition: &dyn ProcessPluginDefinition,
    ) -> Result<Arc<ModuleDescriptor>, PluginLoadError> {
        let plugin = format!("{} {}", definition.name(), definition.version());
        let api_version = definition.api_version();
        let api_context = self.api_contexts.get(&api_version).ok_or_else(|| {
            PluginLoadError::UnsupportedApiVersion {
                plugin: plugin.clone(),
                api_version,
            }
        })?;

        let identities = definition.process_identities();
        if identities.is_empty() {
            return Err(PluginLoadError::NoProcesses { plugin });
        }

        let container = ServiceContainer::new(definition.name(), definition.handlers())
            .map_err(|source| PluginLoadError::Container {
                plugin: plugin.clone(),
                source,
            })?;

        let default_class = definition.default_task_listener_class();
        container
            .check(default_class, HandlerKind::TaskListener)
            .map_err(|source| PluginLoadError::Container {
                plugin: plugin.clone(),
                source,
            })?;

        let context = LoadingContext::isolated(
            format!("{}-{}", definition.name(), definition.version()),
            Some(Arc::clone(api_context)),
            definition.class_source(),
            Some(Arc::clone(&self.rewriter)),
        );
        context
            .load_class(default_class)
            .map_err(|source| PluginLoadError::DefaultListener {
                plugin: plugin.clone(),
                class_name: default_class.to_owned(),
                source,
            })?;

        let module = Arc::new(ModuleDescriptor::new(
            definition.name(),
            definition.version(),
            api_version,
            context,
            container,
            identities,
            default_class,
            definition.value_codecs(),
        ));

        if self.validate_models {
            for (file, xml) in definition.process_models() {
                self.validate_model(&module, &file, &xml)?;
            }
        }

        info!(
            plugin = module.name(),
            version = module.version(),
            api_version,
            context = module.context().name(),
            processes = module.identities().len(),
            handlers = module.container().len(),
            "Loaded process plugin"
        );
        Ok(module)
    }

    /// Loads every definition, skipping those that fail.
    #[must_use]
    pub fn load_all(
        &self,
        definitions: &[Arc<dyn ProcessPluginDefinition>],
    ) -> Vec<Arc<ModuleDescriptor>> {
        definitions
            .iter()
            .filter_map(|definition| match self.load(definition.as_ref()) {
                Ok(module) => Some(module),
                Err(e) => {
                    error!(
                        plugin = definition.name(),
                        version = definition.version(),
                        error = %e,
                        "Unable to load process plugin, skipping"
                    );
                    None
                }
            })
            .collect()
    }

    fn validate_model(
        &self,
        module: &Arc<ModuleDescriptor>,
        file: &str,
        xml: &str,
    ) -> Result<(), PluginLoadError> {
        let processes = self
            .interceptor
            .parse_for_module(xml, module)
            .map_err(|source| PluginLoadError::InvalidModel {
                plugin: module.to_string(),
                file: file.to_owned(),
                source,
            })?;

        for process in &processes {
            if !module.owns(&process.identity) {
                return Err(PluginLoadError::UndeclaredProcess {
                    plugin: module.to_string(),
                    file: file.to_owned(),
                    identity: process.identity.clone(),
                });
            }
            for binding in process.bindings() {
                module
                    .container()
                    .check(binding.class_name(), binding.kind().handler_kind())
                    .map_err(|source| PluginLoadError::UnboundHandler {
                        plugin: module.to_string(),
                        file: file.to_owned(),
                        class_name: binding.class_name().to_owned(),
                        source,
                    })?;
            }
        }

        debug!(
            plugin = module.name(),
            file,
            processes = processes.len(),
            "Validated process model"
        );
        Ok(())
    }
}
