//! Driver error types.
//!
//! Errors are split by who has to act on them: [`ResolveError`] is internal
//! to dependency lookup, [`RetryOr`] tells the authority whether an attach
//! should be retried, and [`LifecycleError`] reports rejected commit steps.

use hdmitx_timing::TimingError;

use crate::params::ParamError;
use crate::pipeline::PipelineError;
use crate::state::{DeviceState, Operation};

/// Outcome of looking up the downstream sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The topology declares no sink for this device. Configuration error.
    #[error("no sink declared in topology")]
    NotFound,
    /// The sink is declared but its driver has not attached yet.
    #[error("sink driver not attached yet")]
    NotReady,
}

/// An error that may be transient.
///
/// `Retry` means a dependency is not available yet and the same request
/// should be made again later; `Fatal` means retrying cannot help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryOr<E> {
    /// Try again once the dependency has probed.
    #[error("dependency not ready, retry later")]
    Retry,
    /// Permanent failure.
    #[error(transparent)]
    Fatal(E),
}

impl<E> RetryOr<E> {
    /// Returns `true` for the retryable outcome.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::Retry)
    }

    /// Returns the fatal error, if any.
    #[must_use]
    pub fn fatal(self) -> Option<E> {
        match self {
            Self::Retry => None,
            Self::Fatal(e) => Some(e),
        }
    }
}

/// Permanent attach failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    /// The topology has no sink connected to our output port.
    #[error("no sink connected to output port")]
    NoSink,
    /// The sink device exports no bridge to link against.
    #[error("sink exports no bridge")]
    BridgeNotFound,
    /// The authority refused the encoder registration.
    #[error("encoder registration failed: {0}")]
    Register(PipelineError),
    /// The authority refused the parameter registration.
    #[error("parameter registration failed: {0}")]
    Parameters(PipelineError),
    /// Linking the encoder to the sink's bridge failed.
    #[error("bridge attach failed: {0}")]
    Link(PipelineError),
    /// Attach requested outside the `Unbound` state.
    #[error("attach not allowed in state {0}")]
    InvalidState(DeviceState),
}

/// Errors from mode-set, enable, disable and parameter access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The operation is not valid in the current state.
    #[error("{op} not allowed in state {state}")]
    InvalidState {
        /// What was requested.
        op: Operation,
        /// State at the time of the request.
        state: DeviceState,
    },
    /// `enable()` before any mode was stored.
    #[error("enable requested before a mode was set")]
    NoModeSet,
    /// The mode was malformed; the previous timing is kept.
    #[error("mode rejected: {0}")]
    Timing(#[from] TimingError),
    /// A parameter read or write was rejected.
    #[error(transparent)]
    Param(#[from] ParamError),
}
