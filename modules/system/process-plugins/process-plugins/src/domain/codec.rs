//! Codecs for variables whose type was defined inside a plugin context.
//!
//! A bare type name is ambiguous across plugins: two plugins may each define
//! `dev/dsf/Ping` and the two types are not interchangeable. Codecs are
//! therefore keyed by the identity of the defining context and the type name.
//! Persisted values record the context name, which is unique within a
//! registry snapshot, so they can be read back after the host restarts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use process_plugins_sdk::{AnyValue, ValueCodec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::descriptor::ModuleDescriptor;
use super::error::CodecRegistryError;
use super::registry::ModuleRegistry;
use crate::infra::loader::DefinedType;

/// Runtime value of a plugin-defined type.
#[derive(Clone)]
pub struct ObjectValue {
    ty: Arc<DefinedType>,
    data: AnyValue,
}

impl ObjectValue {
    #[must_use]
    pub fn new(ty: Arc<DefinedType>, data: AnyValue) -> Self {
        Self { ty, data }
    }

    #[must_use]
    pub fn ty(&self) -> &Arc<DefinedType> {
        &self.ty
    }

    #[must_use]
    pub fn data(&self) -> &AnyValue {
        &self.data
    }

    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// Persisted form of an [`ObjectValue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub type_name: String,
    /// Name of the loading context that defined the type.
    pub context: String,
    /// Qualified codec name, `context/codec`.
    pub codec: String,
    pub bytes: Vec<u8>,
}

/// Codec lookup tables of one registry snapshot.
#[derive(Default)]
pub struct CodecIndex {
    by_type: HashMap<(Uuid, String), Arc<dyn ValueCodec>>,
    by_name: HashMap<String, Arc<dyn ValueCodec>>,
}

impl CodecIndex {
    /// # Errors
    ///
    /// Returns [`CodecRegistryError::DuplicateCodec`] if one plugin contributes two
    /// codecs for the same type or two codecs with the same name.
    pub fn build(modules: &[Arc<ModuleDescriptor>]) -> Result<Self, CodecRegistryError> {
        let mut index = Self::default();
        for module in modules {
            let context_id = module.context().id();
            let context = module.context().name().to_owned();
            for codec in module.codecs() {
                let key = (context_id, codec.type_name().replace('.', "/"));
                if index.by_type.contains_key(&key) {
                    return Err(CodecRegistryError::DuplicateCodec {
                        context,
                        type_name: key.1,
                    });
                }
                let qualified = qualified_name(&context, codec.name());
                if index.by_name.contains_key(&qualified) {
                    return Err(CodecRegistryError::DuplicateCodec {
                        context,
                        type_name: codec.type_name().to_owned(),
                    });
                }
                index.by_type.insert(key, Arc::clone(codec));
                index.by_name.insert(qualified, Arc::clone(codec));
            }
        }
        Ok(index)
    }

    #[must_use]
    pub fn for_type(&self, context_id: Uuid, type_name: &str) -> Option<&Arc<dyn ValueCodec>> {
        self.by_type.get(&(context_id, type_name.replace('.', "/")))
    }

    #[must_use]
    pub fn by_qualified_name(&self, qualified: &str) -> Option<&Arc<dyn ValueCodec>> {
        self.by_name.get(qualified)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[must_use]
pub fn qualified_name(context: &str, codec: &str) -> String {
    format!("{context}/{codec}")
}

/// Reads and writes plugin-defined values against the current registry snapshot.
#[derive(Clone)]
pub struct CrossModuleValueCodec {
    registry: Arc<ModuleRegistry>,
}

impl CrossModuleValueCodec {
    #[must_use]
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    /// Encodes `value` with the codec its defining context contributed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecRegistryError::SerializationMiss`] if that context is not
    /// deployed or contributed no codec for the type, or the codec's error.
    pub fn write(&self, value: &ObjectValue) -> Result<StoredValue, CodecRegistryError> {
        let snapshot = self.registry.snapshot();
        let context = value.ty.context_name();
        let type_name = value.ty.name();

        let codec = snapshot
            .codecs()
            .for_type(value.ty.context_id(), type_name)
            .ok_or_else(|| miss(context, type_name))?;
        let bytes = codec.encode(value.data.as_ref())?;

        Ok(StoredValue {
            type_name: type_name.to_owned(),
            context: context.to_owned(),
            codec: qualified_name(context, codec.name()),
            bytes,
        })
    }

    /// Decodes `stored` with the codec of the context recorded alongside it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecRegistryError::SerializationMiss`] if the recorded context is
    /// not deployed or contributed no codec for the type.
    pub fn read(&self, stored: &StoredValue) -> Result<ObjectValue, CodecRegistryError> {
        let snapshot = self.registry.snapshot();
        let module = snapshot
            .module_by_context(&stored.context)
            .ok_or_else(|| miss(&stored.context, &stored.type_name))?;
        let codec = snapshot
            .codecs()
            .for_type(module.context().id(), &stored.type_name)
            .ok_or_else(|| miss(&stored.context, &stored.type_name))?;

        let ty = module
            .context()
            .load_class(&stored.type_name)
            .map_err(|source| CodecRegistryError::Load {
                type_name: stored.type_name.clone(),
                context: stored.context.clone(),
                source,
            })?;
        let data = codec.decode(&stored.bytes)?;
        Ok(ObjectValue { ty, data })
    }

    /// Codec addressed by its qualified name `context/codec`.
    #[must_use]
    pub fn codec(&self, qualified: &str) -> Option<Arc<dyn ValueCodec>> {
        self.registry
            .snapshot()
            .codecs()
            .by_qualified_name(qualified)
            .cloned()
    }
}

fn miss(context: &str, type_name: &str) -> CodecRegistryError {
    tracing::error!(context, type_name, "No codec for plugin-defined value");
    CodecRegistryError::SerializationMiss {
        type_name: type_name.to_owned(),
        context: context.to_owned(),
    }
}
