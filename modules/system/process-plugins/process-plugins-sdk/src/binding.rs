//! Static handler configuration captured from process models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value of a single field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Literal string value.
    String(String),
    /// Expression text, evaluated by the handler if it supports expressions.
    Expression(String),
}

impl FieldValue {
    /// Raw text of the value regardless of its kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::String(s) | FieldValue::Expression(s) => s,
        }
    }
}

/// Field declarations attached to a step or listener in a process model.
///
/// The host hands this to the plugin's handler factory on every call so the
/// created handler sees exactly the configuration of the element that invoked it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    fields: BTreeMap<String, FieldValue>,
}

impl BindingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field declaration; a later declaration with the same name wins.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns the value of a literal string field.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::String(s) => Some(s),
            FieldValue::Expression(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
