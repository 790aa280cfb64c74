//! Process identity -> plugin registry.
//!
//! The registry is an immutable snapshot behind an `ArcSwap`. Registration
//! builds a complete new snapshot and swaps it in; readers never lock and never
//! observe a partially built map.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use process_plugins_sdk::ProcessIdentity;
use tracing::info;

use super::codec::CodecIndex;
use super::descriptor::ModuleDescriptor;
use super::error::RegistryError;

/// One published state of the registry.
pub struct RegistrySnapshot {
    generation: u64,
    modules: Vec<Arc<ModuleDescriptor>>,
    by_identity: HashMap<ProcessIdentity, Arc<ModuleDescriptor>>,
    by_context: HashMap<String, Arc<ModuleDescriptor>>,
    codecs: CodecIndex,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            modules: Vec::new(),
            by_identity: HashMap::new(),
            by_context: HashMap::new(),
            codecs: CodecIndex::default(),
        }
    }

    fn build(generation: u64, modules: Vec<Arc<ModuleDescriptor>>) -> Result<Self, RegistryError> {
        let mut by_identity: HashMap<ProcessIdentity, Arc<ModuleDescriptor>> = HashMap::new();
        let mut by_context: HashMap<String, Arc<ModuleDescriptor>> =
            HashMap::with_capacity(modules.len());
        let mut deployed: HashSet<(String, String)> = HashSet::with_capacity(modules.len());

        for module in &modules {
            let key = (module.name().to_owned(), module.version().to_owned());
            if !deployed.insert(key) {
                return Err(RegistryError::DuplicateModule {
                    name: module.name().to_owned(),
                    version: module.version().to_owned(),
                });
            }
            match by_context.entry(module.context().name().to_owned()) {
                Entry::Occupied(existing) => {
                    return Err(RegistryError::DuplicateContext {
                        context: existing.key().clone(),
                        first: existing.get().to_string(),
                        second: module.to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(module));
                }
            }

            for identity in module.identities() {
                match by_identity.entry(identity.clone()) {
                    Entry::Occupied(existing) => {
                        return Err(RegistryError::DuplicateIdentity {
                            identity: identity.clone(),
                            first: existing.get().to_string(),
                            second: module.to_string(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Arc::clone(module));
                    }
                }
            }
        }

        let codecs = CodecIndex::build(&modules)?;
        Ok(Self {
            generation,
            modules,
            by_identity,
            by_context,
            codecs,
        })
    }

    /// Monotonically increasing publication counter; `0` for the initial empty snapshot.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn resolve(&self, identity: &ProcessIdentity) -> Option<&Arc<ModuleDescriptor>> {
        self.by_identity.get(identity)
    }

    #[must_use]
    pub fn modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    /// Module whose loading context has the given name.
    #[must_use]
    pub fn module_by_context(&self, context: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.by_context.get(context)
    }

    #[must_use]
    pub fn identities(&self) -> Vec<&ProcessIdentity> {
        let mut identities: Vec<&ProcessIdentity> = self.by_identity.keys().collect();
        identities.sort();
        identities
    }

    #[must_use]
    pub fn codecs(&self) -> &CodecIndex {
        &self.codecs
    }
}

impl fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("generation", &self.generation)
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

pub struct ModuleRegistry {
    current: ArcSwap<RegistrySnapshot>,
    // Serializes writers; readers go through `current` only.
    publish: Mutex<()>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::empty()),
            publish: Mutex::new(()),
        }
    }

    /// Replaces the whole registry with `modules`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if two modules claim the same identity, a module
    /// is listed twice, two modules share a loading context name, or the codec
    /// index cannot be built. Nothing is published in that case.
    pub fn register(
        &self,
        modules: Vec<Arc<ModuleDescriptor>>,
    ) -> Result<Arc<RegistrySnapshot>, RegistryError> {
        self.update(|_| modules)
    }

    /// Publishes the modules `f` derives from the current snapshot.
    ///
    /// `f` runs under the writer lock, so concurrent updates never lose each
    /// other's changes.
    ///
    /// # Errors
    ///
    /// See [`ModuleRegistry::register`].
    pub fn update<F>(&self, f: F) -> Result<Arc<RegistrySnapshot>, RegistryError>
    where
        F: FnOnce(&RegistrySnapshot) -> Vec<Arc<ModuleDescriptor>>,
    {
        let _publish = self.publish.lock();
        let current = self.current.load_full();
        let snapshot = Arc::new(RegistrySnapshot::build(current.generation + 1, f(&current))?);
        self.current.store(Arc::clone(&snapshot));

        info!(
            generation = snapshot.generation,
            modules = snapshot.modules.len(),
            processes = snapshot.by_identity.len(),
            codecs = snapshot.codecs.len(),
            "Published process plugin registry"
        );
        Ok(snapshot)
    }

    /// Owner of `identity` in the current snapshot.
    #[must_use]
    pub fn resolve(&self, identity: &ProcessIdentity) -> Option<Arc<ModuleDescriptor>> {
        self.current.load().resolve(identity).cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
