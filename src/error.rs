//! Canonical error type for call and listener operations.
//!
//! Wrappers never create these on their own account: every error seen by a
//! caller originates in the delegate (or in construction of a wrapper or
//! chain) and propagates unchanged through any number of forwarding layers.

use thiserror::Error;

use crate::{
    metadata::MetadataError,
    status::{Code, Status},
};

/// Errors surfaced synchronously by calls, listeners and chain builders.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// An operation was invoked after the terminal state, or out of order.
    #[error("{operation} is not permitted while the call is {state}")]
    IllegalState {
        /// Operation that was rejected.
        operation: &'static str,
        /// Lifecycle state at the time of the call.
        state: &'static str,
    },
    /// A wrapper or chain was built without a usable delegate.
    #[error("invalid delegate: {0}")]
    Delegation(String),
    /// Caller-supplied metadata was invalid.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    /// No handler is registered for the method.
    #[error("method {0} is not registered")]
    UnknownMethod(String),
    /// A handler was already registered for the method.
    #[error("method {0} is already registered")]
    DuplicateMethod(String),
    /// A runtime-backed component was built outside a Tokio runtime.
    #[error("no tokio runtime is available")]
    NoRuntime,
}

impl CallError {
    /// Build an [`CallError::IllegalState`] error.
    #[must_use]
    pub fn illegal_state(operation: &'static str, state: &'static str) -> Self {
        Self::IllegalState { operation, state }
    }

    /// Returns `true` for [`CallError::IllegalState`].
    #[must_use]
    pub fn is_illegal_state(&self) -> bool { matches!(self, Self::IllegalState { .. }) }
}

impl From<&CallError> for Status {
    fn from(error: &CallError) -> Self {
        let code = match error {
            CallError::Metadata(_) => Code::InvalidArgument,
            CallError::UnknownMethod(_) => Code::Unimplemented,
            CallError::DuplicateMethod(_) => Code::AlreadyExists,
            CallError::IllegalState { .. } | CallError::Delegation(_) | CallError::NoRuntime => {
                Code::Internal
            }
        };
        Status::new(code).with_description(error.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_state_renders_operation_and_state() {
        let err = CallError::illegal_state("send_message", "closed");
        assert_eq!(
            err.to_string(),
            "send_message is not permitted while the call is closed"
        );
        assert!(err.is_illegal_state());
    }

    #[test]
    fn maps_to_status_codes() {
        let status = Status::from(&CallError::UnknownMethod("svc/M".into()));
        assert_eq!(status.code(), Code::Unimplemented);
        let status = Status::from(&CallError::illegal_state("start", "closed"));
        assert_eq!(status.code(), Code::Internal);
    }
}
