//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use troy_runtime::{Interpreter, TraceEvent};

/// Install a test-friendly subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Load `source`, panicking with the parse error on failure.
pub fn interpreter(source: &str) -> Interpreter {
    init_tracing();
    Interpreter::from_source(source).expect("Failed to load test program")
}

/// One recorded event: (kind, function, depth, line).
pub type Recorded = (&'static str, String, usize, usize);

/// A hook closure that records every event into the returned buffer.
pub fn recorder() -> (
    Rc<RefCell<Vec<Recorded>>>,
    impl FnMut(&TraceEvent<'_>) + 'static,
) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let hook = move |event: &TraceEvent<'_>| {
        sink.borrow_mut().push((
            event.kind.name(),
            event.activation.function().to_string(),
            event.activation.depth(),
            event.activation.line(),
        ));
    };
    (events, hook)
}
