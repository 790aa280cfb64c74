//! Host facade wiring registry, loader, router, interceptor and codec.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use process_plugins_sdk::{
    ClassSource, LifecycleListenerFactory, ProcessIdentity, ProcessPluginDefinition,
    registered_plugins,
};
use tracing::info;

use crate::config::ProcessPluginsConfig;
use crate::domain::codec::CrossModuleValueCodec;
use crate::domain::definition::DefinitionParsingInterceptor;
use crate::domain::error::HostError;
use crate::domain::lifecycle::LifecycleListeners;
use crate::domain::recovery::RecoveryPath;
use crate::domain::registry::{ModuleRegistry, RegistrySnapshot};
use crate::domain::router::DelegateRouter;
use crate::engine::ProcessEngine;
use crate::infra::loader::{LoadingContext, NamespaceRewriter};
use crate::plugin_loader::ProcessPluginLoader;
use crate::tracker::TaskTracker;

pub struct ProcessPluginsHost {
    config: ProcessPluginsConfig,
    registry: Arc<ModuleRegistry>,
    loader: ProcessPluginLoader,
    router: DelegateRouter,
    interceptor: DefinitionParsingInterceptor,
    codec: CrossModuleValueCodec,
}

impl ProcessPluginsHost {
    /// Builds the host with one API context per supported API version.
    ///
    /// `lifecycle_listeners` holds at most one factory per API version; processes
    /// of a version without one get no lifecycle listeners.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the namespace rewrite is invalid, no class
    /// source is given for a supported API version, or two lifecycle listener
    /// factories serve the same API version.
    pub fn new(
        config: ProcessPluginsConfig,
        api_sources: HashMap<u32, Arc<dyn ClassSource>>,
        lifecycle_listeners: Vec<Arc<dyn LifecycleListenerFactory>>,
        tracker: Arc<dyn TaskTracker>,
        engine: Arc<dyn ProcessEngine>,
    ) -> Result<Self, HostError> {
        let rewriter = Arc::new(NamespaceRewriter::new(
            &config.namespace_rewrite.from,
            &config.namespace_rewrite.to,
        )?);

        let mut api_contexts = HashMap::with_capacity(config.supported_api_versions.len());
        for &version in &config.supported_api_versions {
            let source = api_sources
                .get(&version)
                .ok_or(HostError::MissingApiSource(version))?;
            api_contexts.insert(
                version,
                LoadingContext::root(format!("process-api-v{version}"), Arc::clone(source)),
            );
        }

        let lifecycle = LifecycleListeners::new(lifecycle_listeners)?;
        let registry = Arc::new(ModuleRegistry::new());
        let interceptor =
            DefinitionParsingInterceptor::new(Arc::clone(&registry), lifecycle.clone());
        let loader = ProcessPluginLoader::new(
            api_contexts,
            rewriter,
            interceptor.clone(),
            config.validate_models,
        );
        let router = DelegateRouter::new(
            Arc::clone(&registry),
            RecoveryPath::new(tracker, engine, config.recovery.clone()),
            lifecycle,
        );
        let codec = CrossModuleValueCodec::new(Arc::clone(&registry));

        Ok(Self {
            config,
            registry,
            loader,
            router,
            interceptor,
            codec,
        })
    }

    /// Loads `definitions` and publishes them as the new registry state.
    ///
    /// Plugins that fail to load are skipped. Calls already running keep the
    /// descriptors they resolved.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Registry`] if the loaded plugins conflict; the
    /// previous registry state stays published.
    pub fn deploy(
        &self,
        definitions: &[Arc<dyn ProcessPluginDefinition>],
    ) -> Result<Arc<RegistrySnapshot>, HostError> {
        let modules = self.loader.load_all(definitions);
        let skipped = definitions.len() - modules.len();
        let snapshot = self.registry.register(modules)?;
        info!(
            generation = snapshot.generation(),
            deployed = snapshot.modules().len(),
            skipped,
            "Deployed process plugins"
        );
        Ok(snapshot)
    }

    /// Deploys `definitions` next to the plugins already deployed.
    ///
    /// A definition replaces the deployed plugin with the same name and
    /// version. An older version of the same plugin stays deployed for every
    /// process identity the new definitions do not claim, so instances started
    /// on an old process version keep resolving. Plugins with other names are
    /// kept as they are.
    ///
    /// A plugin that fails to load is skipped and its previous version stays
    /// deployed.
    ///
    /// # Errors
    ///
    /// See [`ProcessPluginsHost::deploy`].
    pub fn redeploy(
        &self,
        definitions: &[Arc<dyn ProcessPluginDefinition>],
    ) -> Result<Arc<RegistrySnapshot>, HostError> {
        let loaded = self.loader.load_all(definitions);
        let upgraded: HashSet<&str> = loaded.iter().map(|m| m.name()).collect();
        let claimed: HashSet<&ProcessIdentity> =
            loaded.iter().flat_map(|m| m.identities()).collect();

        let mut retired = 0_usize;
        let snapshot = self.registry.update(|current| {
            let mut modules = Vec::with_capacity(current.modules().len() + loaded.len());
            for module in current.modules() {
                let same_version = loaded
                    .iter()
                    .any(|m| m.name() == module.name() && m.version() == module.version());
                if !upgraded.contains(module.name()) {
                    modules.push(Arc::clone(module));
                } else if same_version
                    || module.identities().iter().all(|id| claimed.contains(id))
                {
                    retired += 1;
                } else if module.identities().iter().any(|id| claimed.contains(id)) {
                    modules.push(Arc::new(module.narrowed(|id| !claimed.contains(id))));
                } else {
                    modules.push(Arc::clone(module));
                }
            }
            modules.extend(loaded.iter().cloned());
            modules
        })?;
        info!(
            generation = snapshot.generation(),
            loaded = loaded.len(),
            retired,
            skipped = definitions.len() - loaded.len(),
            "Redeployed process plugins"
        );
        Ok(snapshot)
    }

    /// Deploys every plugin registered with `inventory::submit!`.
    ///
    /// # Errors
    ///
    /// See [`ProcessPluginsHost::deploy`].
    pub fn deploy_discovered(&self) -> Result<Arc<RegistrySnapshot>, HostError> {
        self.deploy(&registered_plugins())
    }

    #[must_use]
    pub fn config(&self) -> &ProcessPluginsConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn loader(&self) -> &ProcessPluginLoader {
        &self.loader
    }

    #[must_use]
    pub fn router(&self) -> &DelegateRouter {
        &self.router
    }

    #[must_use]
    pub fn interceptor(&self) -> &DefinitionParsingInterceptor {
        &self.interceptor
    }

    #[must_use]
    pub fn codec(&self) -> &CrossModuleValueCodec {
        &self.codec
    }
}
