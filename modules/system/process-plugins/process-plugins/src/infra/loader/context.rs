//! Isolated loading contexts.
//!
//! A context owns the types it defines. Type identity is `(context id, name)`,
//! so the same class name loaded by two plugin contexts yields two distinct,
//! non-interchangeable types.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use process_plugins_sdk::ClassSource;
use uuid::Uuid;

use super::error::LoadError;
use super::rewrite::{NamespaceRewriter, RewriteStats};
use crate::infra::classfile::{ClassUnit, verify};

type Slot = Arc<Mutex<Option<Arc<DefinedType>>>>;

/// Class namespace of one plugin (or of one host API version).
pub struct LoadingContext {
    id: Uuid,
    name: String,
    parent: Option<Arc<LoadingContext>>,
    source: Arc<dyn ClassSource>,
    rewriter: Option<Arc<NamespaceRewriter>>,
    slots: DashMap<String, Slot>,
    self_ref: Weak<LoadingContext>,
}

impl LoadingContext {
    /// Context without parent and without rewriting, used for host API classes.
    #[must_use]
    pub fn root(name: impl Into<String>, source: Arc<dyn ClassSource>) -> Arc<Self> {
        Self::isolated(name, None, source, None)
    }

    /// Context delegating to `parent` first and rewriting locally defined classes.
    #[must_use]
    pub fn isolated(
        name: impl Into<String>,
        parent: Option<Arc<LoadingContext>>,
        source: Arc<dyn ClassSource>,
        rewriter: Option<Arc<NamespaceRewriter>>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_ref| Self {
            id: Uuid::new_v4(),
            name,
            parent,
            source,
            rewriter,
            slots: DashMap::new(),
            self_ref: self_ref.clone(),
        })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<LoadingContext>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Loads a class by dotted or internal name, parent first.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotFound`] if neither the parent chain nor this
    /// context's source provides the class, or another [`LoadError`] if the
    /// class cannot be defined.
    pub fn load_class(&self, name: &str) -> Result<Arc<DefinedType>, LoadError> {
        let internal = name.replace('.', "/");
        if let Some(parent) = &self.parent {
            match parent.load_class(&internal) {
                Ok(defined) => return Ok(defined),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.find_class(&internal)
    }

    /// Returns a class previously defined by this context itself.
    #[must_use]
    pub fn find_loaded(&self, name: &str) -> Option<Arc<DefinedType>> {
        let internal = name.replace('.', "/");
        let slot = self.slots.get(&internal).map(|s| Arc::clone(s.value()))?;
        slot.lock().clone()
    }

    /// Classes defined by this context so far.
    #[must_use]
    pub fn defined_classes(&self) -> Vec<Arc<DefinedType>> {
        let slots: Vec<Slot> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        let mut defined: Vec<Arc<DefinedType>> =
            slots.iter().filter_map(|slot| slot.lock().clone()).collect();
        defined.sort_by(|a, b| a.name().cmp(b.name()));
        defined
    }

    fn find_class(&self, internal: &str) -> Result<Arc<DefinedType>, LoadError> {
        loop {
            let slot = Arc::clone(self.slots.entry(internal.to_owned()).or_default().value());

            // Held while defining so concurrent loads of one class define it once.
            let mut guard = slot.lock();
            if let Some(defined) = guard.as_ref() {
                return Ok(Arc::clone(defined));
            }
            // A failed load dropped this slot while we waited on it.
            let current = self
                .slots
                .get(internal)
                .is_some_and(|entry| Arc::ptr_eq(entry.value(), &slot));
            if !current {
                continue;
            }

            return match self.define(internal) {
                Ok(defined) => {
                    let defined = Arc::new(defined);
                    *guard = Some(Arc::clone(&defined));
                    Ok(defined)
                }
                Err(e) => {
                    self.slots
                        .remove_if(internal, |_, entry| Arc::ptr_eq(entry, &slot));
                    Err(e)
                }
            };
        }
    }

    fn define(&self, internal: &str) -> Result<DefinedType, LoadError> {
        let path = ClassUnit::resource_path(internal);
        let bytes = self
            .source
            .read(&path)
            .map_err(|source| LoadError::Io {
                class: internal.to_owned(),
                source,
            })?
            .ok_or_else(|| LoadError::NotFound {
                context: self.name.clone(),
                class: internal.to_owned(),
            })?;

        let mut unit = ClassUnit::decode(&bytes).map_err(|source| LoadError::Format {
            class: internal.to_owned(),
            source,
        })?;
        if unit.name != internal {
            return Err(LoadError::NameMismatch {
                expected: internal.to_owned(),
                found: unit.name,
            });
        }

        verify::verify(&unit).map_err(|source| LoadError::Verify {
            class: internal.to_owned(),
            source,
        })?;

        let rewrites = match &self.rewriter {
            Some(rewriter) => {
                let stats = rewriter.rewrite(&mut unit).map_err(|source| LoadError::Rewrite {
                    class: internal.to_owned(),
                    source,
                })?;
                if stats.total() > 0 {
                    verify::recompute_frames(&mut unit);
                    unit.refresh_digest().map_err(|source| LoadError::Format {
                        class: internal.to_owned(),
                        source,
                    })?;
                    verify::verify(&unit).map_err(|source| LoadError::Verify {
                        class: internal.to_owned(),
                        source,
                    })?;
                }
                stats
            }
            None => RewriteStats::default(),
        };

        tracing::debug!(
            context = %self.name,
            class = %internal,
            rewrites = rewrites.total(),
            "Defined class"
        );

        Ok(DefinedType {
            context_id: self.id,
            context_name: self.name.clone(),
            context: self.self_ref.clone(),
            unit,
            rewrites,
        })
    }
}

impl fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("source", &self.source.describe())
            .field("defined", &self.slots.len())
            .finish_non_exhaustive()
    }
}

/// A class unit linked into a loading context.
pub struct DefinedType {
    context_id: Uuid,
    context_name: String,
    context: Weak<LoadingContext>,
    unit: ClassUnit,
    rewrites: RewriteStats,
}

impl DefinedType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.unit.name
    }

    #[must_use]
    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    #[must_use]
    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    #[must_use]
    pub fn super_name(&self) -> Option<&str> {
        self.unit.super_name.as_deref()
    }

    #[must_use]
    pub fn interfaces(&self) -> &[String] {
        &self.unit.interfaces
    }

    /// The unit as linked, after rewriting.
    #[must_use]
    pub fn unit(&self) -> &ClassUnit {
        &self.unit
    }

    #[must_use]
    pub fn rewrites(&self) -> RewriteStats {
        self.rewrites
    }

    /// Whether a value of this type can be used where `other` is expected.
    ///
    /// Supertypes are resolved through the context that declared each link of
    /// the chain; supertypes no context can provide end that branch.
    #[must_use]
    pub fn is_subtype_of(&self, other: &DefinedType) -> bool {
        if self == other {
            return true;
        }

        let mut visited: HashSet<(Uuid, String)> = HashSet::new();
        let mut pending: Vec<(Weak<LoadingContext>, String)> = self
            .supertype_names()
            .map(|name| (self.context.clone(), name.to_owned()))
            .collect();

        while let Some((context, name)) = pending.pop() {
            let Some(context) = context.upgrade() else {
                continue;
            };
            let Ok(supertype) = context.load_class(&name) else {
                continue;
            };
            if !visited.insert((supertype.context_id, supertype.name().to_owned())) {
                continue;
            }
            if *supertype == *other {
                return true;
            }
            pending.extend(
                supertype
                    .supertype_names()
                    .map(|name| (supertype.context.clone(), name.to_owned())),
            );
        }
        false
    }

    fn supertype_names(&self) -> impl Iterator<Item = &str> {
        self.unit
            .super_name
            .as_deref()
            .into_iter()
            .chain(self.unit.interfaces.iter().map(String::as_str))
    }
}

impl PartialEq for DefinedType {
    fn eq(&self, other: &Self) -> bool {
        self.context_id == other.context_id && self.unit.name == other.unit.name
    }
}

impl Eq for DefinedType {}

impl fmt::Debug for DefinedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinedType")
            .field("name", &self.unit.name)
            .field("context", &self.context_name)
            .field("context_id", &self.context_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DefinedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.unit.name, self.context_name)
    }
}
