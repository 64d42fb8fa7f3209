//! Errors and the control-flow signal threaded through frame bodies.
//!
//! Every frame body returns a [`Flow`]. The `Err` side is an [`Unwind`]: either a
//! failure travelling outward until a guarded frame catches it, or a non-local
//! transfer travelling outward until the frame it targets pops.

use crate::handle::Handle;
use crate::value::Values;
use thiserror::Error;

/// Failures reported by frame operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    /// The handle's frame is no longer on the stack.
    #[error("Context {uid} has expired: {reason}")]
    ExpiredContext { uid: String, reason: &'static str },

    /// Navigation asked for more ancestors than exist.
    #[error("No such ancestor: requested {kind} frame #{requested} but only {available} exist")]
    NoSuchAncestor {
        requested: usize,
        available: usize,
        kind: &'static str,
    },

    /// The transfer target cannot accept the requested operation.
    #[error("Cannot {operation}: {reason}")]
    NotAReturnableFrame {
        operation: &'static str,
        reason: String,
    },

    /// A handle was compared against something that is not a handle.
    #[error("Cannot compare a context handle with a value of type {found}")]
    InvalidComparison { found: &'static str },

    #[error("Malformed context uid '{0}'")]
    MalformedUid(String),

    /// Failure raised by client code.
    #[error("{0}")]
    Raised(String),
}

impl ScopeError {
    /// Creates a client failure carrying the given message.
    pub fn raised(message: impl Into<String>) -> Self {
        ScopeError::Raised(message.into())
    }

    pub(crate) fn not_returnable(operation: &'static str, reason: impl Into<String>) -> Self {
        ScopeError::NotAReturnableFrame {
            operation,
            reason: reason.into(),
        }
    }
}

/// Which operation issued a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Return from a call frame to its caller.
    Unwind,
    /// Exit from an arbitrary frame.
    Leave,
}

/// A non-local transfer in flight toward `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub(crate) target: Handle,
    pub(crate) kind: TransferKind,
    pub(crate) values: Values,
}

impl Transfer {
    /// The frame that will consume this transfer.
    pub fn target(&self) -> Handle {
        self.target
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// The payload, before the target applies its evaluation context.
    pub fn values(&self) -> &Values {
        &self.values
    }
}

/// Signal propagating out of a frame body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Unwind {
    #[error("Non-local transfer to context {} escaped its target", .0.target)]
    Transfer(Transfer),
    #[error(transparent)]
    Failure(#[from] ScopeError),
}

impl Unwind {
    /// Starts propagating a client failure.
    pub fn raise(message: impl Into<String>) -> Self {
        Unwind::Failure(ScopeError::raised(message))
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Unwind::Transfer(_))
    }

    /// Returns the failure, if this is one.
    pub fn failure(&self) -> Option<&ScopeError> {
        match self {
            Unwind::Failure(error) => Some(error),
            Unwind::Transfer(_) => None,
        }
    }
}

/// Result of running a frame body.
pub type Flow<T = Values> = Result<T, Unwind>;
