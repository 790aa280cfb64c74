//! Value codecs for plugin-defined variable types.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Type-erased value as stored in or read from a process variable.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Serializer for values of a single plugin-defined type.
///
/// `type_name` is the internal name of the class unit that defines the type
/// (e.g. `dev/dsf/bpe/Ping`). The host pairs it with the context that loaded the
/// plugin, so two plugins can each ship a type with the same name.
pub trait ValueCodec: Send + Sync {
    /// Codec name, unique within the plugin.
    fn name(&self) -> &str;

    fn type_name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] if `value` is not of the handled type.
    fn encode(&self, value: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, CodecError>;

    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if `bytes` is not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> Result<AnyValue, CodecError>;
}

/// [`ValueCodec`] that stores values as JSON.
pub struct JsonCodec<T> {
    name: String,
    type_name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> ValueCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn encode(&self, value: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, CodecError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| CodecError::TypeMismatch {
                expected: self.type_name.clone(),
            })?;
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<AnyValue, CodecError> {
        let value: T = serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Arc::new(value))
    }
}
