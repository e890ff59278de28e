//! Error types for troy-core.

use thiserror::Error;
use troy_runtime::{Exception, RuntimeError};

use crate::codec::VariableSnapshot;
use crate::monitor::SessionId;

/// Result type for troy-core operations.
pub type Result<T> = std::result::Result<T, PlaygroundError>;

/// Errors that can occur while running a function in the playground.
#[derive(Debug, Error)]
pub enum PlaygroundError {
    /// The runtime refused to install the capture hook.
    ///
    /// The target has not been run.
    #[error("instrumentation unavailable: {0}")]
    InstrumentationUnavailable(String),

    /// The target raised. Produced by
    /// [`PlaygroundResult::into_result`](crate::PlaygroundResult::into_result).
    #[error("target raised {exception}")]
    TargetRaised {
        #[source]
        exception: Exception,
        snapshot: VariableSnapshot,
    },

    /// A capture session is already active on this thread.
    #[error("capture session {active} is already active on this thread")]
    ReentrancyConflict { active: SessionId },

    /// No function with this name exists in the loaded program.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// Host runtime error.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl PlaygroundError {
    /// Map a hook installation failure.
    ///
    /// A runtime with hooks disabled cannot be observed at all; anything else
    /// (such as a foreign hook already in place) stays a runtime error.
    pub(crate) fn from_install(err: RuntimeError) -> Self {
        match err {
            RuntimeError::HooksDisabled => PlaygroundError::InstrumentationUnavailable(err.to_string()),
            other => PlaygroundError::Runtime(other),
        }
    }
}
