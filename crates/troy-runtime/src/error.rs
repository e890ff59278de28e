//! Error types for troy-runtime.

use thiserror::Error;

/// Result type for troy-runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised by the host runtime itself.
///
/// Faults inside running script code are not `RuntimeError`s; they unwind as
/// [`Exception`](crate::Exception) values instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Failed to parse program source.
    #[error("parse error: {0}")]
    Parse(String),

    /// The program contains an item the runtime cannot load.
    #[error("unsupported item: {0}")]
    UnsupportedItem(String),

    /// Two functions share a name.
    #[error("duplicate function: {0}")]
    DuplicateFunction(String),

    /// Trace hooks are disabled by configuration.
    #[error("trace hooks are disabled for this runtime")]
    HooksDisabled,

    /// A trace hook is already installed.
    #[error("a trace hook is already installed")]
    HookAlreadyInstalled,
}
