//! Error types for experimental control.
//!
//! Three layers, each wrapping the one below:
//!
//! - **`TransportError`**: failures of a vector channel or hardware signal bus
//!   (connect, send/receive, last-error reported by vendor API).
//! - **`ControlError`**: failures of a controller operation. Transport failures
//!   surface as [`ControlError::Transport`] after the controller has released
//!   its link; nothing in this crate terminates the process.
//! - **`RegistryError`**: failures creating or adding registry entries.
//!
//! [`ErrorCategory`] groups all of them into the coarse taxonomy callers act on.

use crate::control::ControllerState;
use crate::response::ResponseKind;
use crate::Tag;
use thiserror::Error;

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid sizing, parameters, or state. Nothing was sent.
    Configuration,
    /// Link failure. The controller is terminated.
    Transport,
    /// Duplicate tag or unknown reference.
    Registry,
    /// The operator declined to continue.
    Cancelled,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Registry => "registry",
            ErrorCategory::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Failure of a channel or signal bus.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Peer address.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O failed mid-session.
    #[error("{operation} failed: {source}")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Vendor API reported an error after a call.
    #[error("{operation} failed with error {code}: {message}")]
    Hardware {
        /// Vendor call that failed.
        operation: String,
        /// Vendor error code.
        code: i32,
        /// Vendor error text.
        message: String,
    },

    /// Peer violated the framing contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The link has already been closed.
    #[error("link closed")]
    Closed,
}

/// Failure of a controller operation.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Size combination rejected by the family predicate.
    #[error("{family}: unsupported sizes: {reason}")]
    UnsupportedSize {
        /// Controller family.
        family: &'static str,
        /// What the predicate rejected.
        reason: String,
    },

    /// Operation not legal in the current state.
    #[error("{operation} not allowed while {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State at the time.
        state: ControllerState,
    },

    /// Caller vector length differs from the negotiated channel count.
    #[error("{kind} vector has {actual} values, expected {expected}")]
    SizeMismatch {
        /// Offending kind.
        kind: ResponseKind,
        /// Negotiated channel count.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// The link failed. The controller released it and is terminated.
    #[error("{family}: {operation} failed: {source}")]
    Transport {
        /// Controller family.
        family: &'static str,
        /// Protocol step that failed.
        operation: &'static str,
        /// Link failure.
        #[source]
        source: TransportError,
    },

    /// Operator cancelled during setup.
    #[error("cancelled by operator")]
    Cancelled,

    /// Invalid construction parameters.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ControlError {
    /// Coarse category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ControlError::UnsupportedSize { .. }
            | ControlError::InvalidState { .. }
            | ControlError::SizeMismatch { .. }
            | ControlError::Configuration(_) => ErrorCategory::Configuration,
            ControlError::Transport { .. } => ErrorCategory::Transport,
            ControlError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// True for link failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, ControlError::Transport { .. })
    }
}

/// Registry namespaces. Tags are unique within one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Experimental controls.
    Controls,
    /// Experimental sites.
    Sites,
    /// Signal filters.
    Filters,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Namespace::Controls => "control",
            Namespace::Sites => "site",
            Namespace::Filters => "filter",
        };
        write!(f, "{}", label)
    }
}

/// Failure creating or adding a registry entry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Tag already present.
    #[error("{namespace} with tag {tag} already exists")]
    DuplicateTag {
        /// Namespace of the tag.
        namespace: Namespace,
        /// Duplicate tag.
        tag: Tag,
    },

    /// Referenced tag does not exist.
    #[error("{namespace} with tag {tag} not found")]
    NotFound {
        /// Namespace searched.
        namespace: Namespace,
        /// Missing tag.
        tag: Tag,
    },

    /// No factory registered for the family name.
    #[error("unknown {namespace} type '{family}'")]
    UnknownFamily {
        /// Namespace searched.
        namespace: Namespace,
        /// Requested family.
        family: String,
    },

    /// Factory configuration rejected.
    #[error("invalid configuration for {family}: {message}")]
    InvalidConfig {
        /// Family whose configuration failed.
        family: String,
        /// Reason.
        message: String,
    },

    /// Constructing or sizing the instance failed.
    #[error(transparent)]
    Control(#[from] ControlError),
}

impl RegistryError {
    /// Shorthand for [`RegistryError::InvalidConfig`].
    pub fn invalid_config(family: impl Into<String>, message: impl Into<String>) -> Self {
        RegistryError::InvalidConfig {
            family: family.into(),
            message: message.into(),
        }
    }

    /// Coarse category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            RegistryError::DuplicateTag { .. }
            | RegistryError::NotFound { .. }
            | RegistryError::UnknownFamily { .. } => ErrorCategory::Registry,
            RegistryError::InvalidConfig { .. } => ErrorCategory::Configuration,
            RegistryError::Control(err) => err.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_categorized() {
        let err = ControlError::Transport {
            family: "SimFEAdapter",
            operation: "acquire",
            source: TransportError::Closed,
        };
        assert!(err.is_transport());
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert_eq!(err.to_string(), "SimFEAdapter: acquire failed: link closed");
    }

    #[test]
    fn registry_wraps_control_category() {
        let err = RegistryError::from(ControlError::Cancelled);
        assert_eq!(err.category(), ErrorCategory::Cancelled);
        let dup = RegistryError::DuplicateTag {
            namespace: Namespace::Controls,
            tag: 3,
        };
        assert_eq!(dup.to_string(), "control with tag 3 already exists");
        assert_eq!(dup.category(), ErrorCategory::Registry);
    }

    #[test]
    fn size_mismatch_message_names_kind() {
        let err = ControlError::SizeMismatch {
            kind: ResponseKind::Force,
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "force vector has 3 values, expected 2");
    }
}
