//! Embedded script runtime for Troy Playground.
//!
//! This crate provides:
//! - Program loading for a Rust-syntax function subset (parsed with `syn`)
//! - Runtime values with shared, identity-carrying lists, iterators and handles
//! - A tree-walking interpreter with native function support
//! - The execution event channel: `call`/`line`/`return`/`exception` events
//!   delivered to a single scoped [`TraceHook`]

pub mod args;
pub mod config;
pub mod error;
pub mod exception;
pub mod interp;
pub mod program;
pub mod trace;
pub mod value;

pub use args::CallArgs;
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use exception::{Exception, TracebackEntry};
pub use interp::{Interpreter, NativeFn};
pub use program::{FunctionDef, Program};
pub use trace::{Activation, EventKind, FrameId, HookGuard, TraceEvent, TraceHook};
pub use value::{CodeId, FunctionRef, HandleObject, IterObject, ListObject, ObjectId, RangeValue, Value};
