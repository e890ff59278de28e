//! Shared helpers for integration tests.

#![allow(dead_code)]

use troy_core::{Interpreter, Program, RuntimeConfig};

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

/// Load `source` with the default runtime configuration.
pub fn interpreter(source: &str) -> Interpreter {
    interpreter_with(source, RuntimeConfig::default())
}

pub fn interpreter_with(source: &str, config: RuntimeConfig) -> Interpreter {
    init_tracing();
    let program = Program::parse(source).expect("Failed to parse test program");
    Interpreter::with_config(program, config)
}
