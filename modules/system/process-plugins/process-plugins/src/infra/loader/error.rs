use std::io;

use thiserror::Error;

use super::rewrite::RewriteError;
use crate::infra::classfile::{ClassFormatError, VerifyError};

/// Failure to load a class through a loading context.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("class {class} not found in {context}")]
    NotFound { context: String, class: String },

    #[error("reading {class} failed")]
    Io {
        class: String,
        #[source]
        source: io::Error,
    },

    #[error("class {class} is malformed")]
    Format {
        class: String,
        #[source]
        source: ClassFormatError,
    },

    #[error("resource for {expected} defines {found}")]
    NameMismatch { expected: String, found: String },

    #[error("class {class} failed verification")]
    Verify {
        class: String,
        #[source]
        source: VerifyError,
    },

    #[error("rewriting {class} failed")]
    Rewrite {
        class: String,
        #[source]
        source: RewriteError,
    },
}

impl LoadError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}
