//! Per-plugin service container.
//!
//! Handlers are addressed by implementation class name, the same string a
//! process model puts into its `class` attributes. Lookup is a map access plus
//! a factory call; each call gets a fresh handler configured with the field
//! declarations of the calling element.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use process_plugins_sdk::{
    BindingConfig, ExecutionListener, HandlerFactory, HandlerKind, StepHandler, TaskListener,
};

use super::error::ContainerError;

pub struct ServiceContainer {
    plugin: String,
    factories: HashMap<String, HandlerFactory>,
}

impl ServiceContainer {
    /// # Errors
    ///
    /// Returns [`ContainerError::Duplicate`] if a class name is declared twice.
    pub fn new(
        plugin: impl Into<String>,
        handlers: Vec<(String, HandlerFactory)>,
    ) -> Result<Self, ContainerError> {
        let plugin = plugin.into();
        let mut factories = HashMap::with_capacity(handlers.len());
        for (class_name, factory) in handlers {
            let class_name = class_name.replace('/', ".");
            if factories.contains_key(&class_name) {
                return Err(ContainerError::Duplicate { plugin, class_name });
            }
            factories.insert(class_name, factory);
        }
        Ok(Self { plugin, factories })
    }

    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    #[must_use]
    pub fn kind_of(&self, class_name: &str) -> Option<HandlerKind> {
        self.factories.get(&normalize(class_name)).map(HandlerFactory::kind)
    }

    /// Checks that `class_name` is registered with the expected kind.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] or [`ContainerError::KindMismatch`].
    pub fn check(&self, class_name: &str, expected: HandlerKind) -> Result<(), ContainerError> {
        let factory = self.factory(class_name)?;
        if factory.kind() == expected {
            Ok(())
        } else {
            Err(ContainerError::KindMismatch {
                class_name: class_name.to_owned(),
                expected,
                actual: factory.kind(),
            })
        }
    }

    /// # Errors
    ///
    /// Returns [`ContainerError`] if no step handler is registered under `class_name`
    /// or its factory rejects `config`.
    pub fn step_handler(
        &self,
        class_name: &str,
        config: &BindingConfig,
    ) -> Result<Arc<dyn StepHandler>, ContainerError> {
        match self.factory(class_name)? {
            HandlerFactory::Step(create) => create(config).map_err(|source| ContainerError::Factory {
                class_name: class_name.to_owned(),
                source,
            }),
            other => Err(mismatch(class_name, HandlerKind::Step, other)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ContainerError`] if no execution listener is registered under
    /// `class_name` or its factory rejects `config`.
    pub fn execution_listener(
        &self,
        class_name: &str,
        config: &BindingConfig,
    ) -> Result<Arc<dyn ExecutionListener>, ContainerError> {
        match self.factory(class_name)? {
            HandlerFactory::ExecutionListener(create) => {
                create(config).map_err(|source| ContainerError::Factory {
                    class_name: class_name.to_owned(),
                    source,
                })
            }
            other => Err(mismatch(class_name, HandlerKind::ExecutionListener, other)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ContainerError`] if no task listener is registered under
    /// `class_name` or its factory rejects `config`.
    pub fn task_listener(
        &self,
        class_name: &str,
        config: &BindingConfig,
    ) -> Result<Arc<dyn TaskListener>, ContainerError> {
        match self.factory(class_name)? {
            HandlerFactory::TaskListener(create) => create(config).map_err(|source| ContainerError::Factory {
                class_name: class_name.to_owned(),
                source,
            }),
            other => Err(mismatch(class_name, HandlerKind::TaskListener, other)),
        }
    }

    /// Registered class names, sorted.
    #[must_use]
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn factory(&self, class_name: &str) -> Result<&HandlerFactory, ContainerError> {
        self.factories
            .get(&normalize(class_name))
            .ok_or_else(|| ContainerError::NotFound {
                plugin: self.plugin.clone(),
                class_name: class_name.to_owned(),
            })
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("plugin", &self.plugin)
            .field("handlers", &self.class_names())
            .finish()
    }
}

fn normalize(class_name: &str) -> String {
    class_name.replace('/', ".")
}

fn mismatch(class_name: &str, expected: HandlerKind, actual: &HandlerFactory) -> ContainerError {
    ContainerError::KindMismatch {
        class_name: class_name.to_owned(),
        expected,
        actual: actual.kind(),
    }
}
