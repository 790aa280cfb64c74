//! Error types shared between the host and plugins.

use thiserror::Error;

/// Result of a failed step or listener call.
#[derive(Debug, Error)]
pub enum StepError {
    /// Recoverable business error; the engine routes it to a matching error boundary event.
    #[error("BPMN error {code}: {message}")]
    Bpmn { code: String, message: String },

    /// Unrecoverable failure; the instance is terminated.
    #[error("{0}")]
    Fault(String),
}

impl StepError {
    #[must_use]
    pub fn bpmn(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bpmn {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }
}

impl From<anyhow::Error> for StepError {
    fn from(e: anyhow::Error) -> Self {
        Self::Fault(format!("{e:#}"))
    }
}

/// Errors raised by a plugin's handler factory.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by a [`crate::ValueCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value is not a {expected}")]
    TypeMismatch { expected: String },

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn anyhow_errors_become_faults_with_context() {
        let err = anyhow::anyhow!("connection refused").context("sending ping");
        let step: StepError = err.into();
        match step {
            StepError::Fault(message) => {
                assert!(message.contains("sending ping"));
                assert!(message.contains("connection refused"));
            }
            StepError::Bpmn { .. } => panic!("expected fault"),
        }
    }
}
