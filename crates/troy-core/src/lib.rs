//! Troy Playground: run a function and see its local variables.
//!
//! This crate provides:
//! - Snapshot codec for turning live bindings into retainable values
//! - Scope matching for nested and recursive calls
//! - An execution monitor that scopes a capture hook to one invocation
//! - The playground entry points returning the outcome plus a snapshot
//!
//! # Module Structure
//!
//! - `codec` - [`capture_value`], [`capture_bindings`], [`VariableSnapshot`]
//! - `scope` - [`ScopeMatcher`], [`ScopeVerdict`]
//! - `monitor` - [`ExecutionMonitor`], [`CaptureSession`], [`Target`]
//! - `playground` - [`run_function_playground`], [`extract_locals`]
//! - `config` - [`PlaygroundConfig`], [`CaptureMode`]

pub mod codec;
pub mod config;
pub mod error;
pub mod monitor;
pub mod playground;
pub mod scope;

pub use codec::{CapturedValue, Placeholder, PlaceholderReason, VariableSnapshot, capture_bindings, capture_value};
pub use config::{CaptureMode, PlaygroundConfig};
pub use error::{PlaygroundError, Result};
pub use monitor::{
    ActivationSnapshot, CaptureSession, EventStats, ExecutionMonitor, MonitorReport, SessionId, Target,
    active_session,
};
pub use playground::{
    LocalsSource, Outcome, PlaygroundResult, extract_locals, run_function_playground,
    run_function_playground_with,
};
pub use scope::{ScopeMatcher, ScopeVerdict};

pub use troy_runtime::{
    Activation, CallArgs, CodeId, EventKind, Exception, FrameId, FunctionRef, HookGuard, Interpreter,
    ObjectId, Program, RuntimeConfig, RuntimeError, TraceEvent, TraceHook, TracebackEntry, Value,
};
