//! Playground entry points.

use serde::Serialize;
use troy_runtime::{Activation, CallArgs, CodeId, Exception, Interpreter, Value};

use crate::codec::{VariableSnapshot, capture_bindings};
use crate::config::PlaygroundConfig;
use crate::error::{PlaygroundError, Result};
use crate::monitor::{ActivationSnapshot, CaptureSession, ExecutionMonitor, SessionId, Target};

/// How the target finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Returned(Value),
    Raised(Exception),
}

impl Outcome {
    pub fn is_returned(&self) -> bool {
        matches!(self, Outcome::Returned(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Returned(value) => Some(value),
            Outcome::Raised(_) => None,
        }
    }

    pub fn exception(&self) -> Option<&Exception> {
        match self {
            Outcome::Returned(_) => None,
            Outcome::Raised(exception) => Some(exception),
        }
    }
}

/// Outcome of a playground run paired with the target's final bindings.
#[derive(Debug, Clone, Serialize)]
pub struct PlaygroundResult {
    session: SessionId,
    function: String,
    code: CodeId,
    outcome: Outcome,
    snapshot: VariableSnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    activations: Vec<ActivationSnapshot>,
}

impl PlaygroundResult {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Name of the function that ran.
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn code(&self) -> CodeId {
        self.code
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Bindings of the invocation at return, or at the raise point.
    pub fn snapshot(&self) -> &VariableSnapshot {
        &self.snapshot
    }

    /// Nested activations of the target, innermost completed first.
    ///
    /// Empty unless the run used [`CaptureMode::AllActivations`](crate::CaptureMode::AllActivations).
    pub fn activations(&self) -> &[ActivationSnapshot] {
        &self.activations
    }

    pub fn return_value(&self) -> Option<&Value> {
        self.outcome.value()
    }

    pub fn exception(&self) -> Option<&Exception> {
        self.outcome.exception()
    }

    /// Convert into a `Result`, turning a raised exception into
    /// [`PlaygroundError::TargetRaised`].
    pub fn into_result(self) -> Result<(Value, VariableSnapshot)> {
        match self.outcome {
            Outcome::Returned(value) => Ok((value, self.snapshot)),
            Outcome::Raised(exception) => Err(PlaygroundError::TargetRaised {
                exception,
                snapshot: self.snapshot,
            }),
        }
    }
}

/// Run `target` with `args` and capture its local variables at exit.
///
/// # Example
///
/// ```
/// use troy_core::{CallArgs, Interpreter, Value, run_function_playground};
///
/// let mut rt = Interpreter::from_source(
///     "fn f() -> i64 { let a = 1; let b = a + 1; return b; }",
/// ).unwrap();
/// let result = run_function_playground(&mut rt, "f", CallArgs::new()).unwrap();
///
/// assert_eq!(result.return_value(), Some(&Value::Int(2)));
/// assert_eq!(result.snapshot().value("b"), Some(Value::Int(2)));
/// ```
pub fn run_function_playground(
    interp: &mut Interpreter,
    target: impl Into<Target>,
    args: CallArgs,
) -> Result<PlaygroundResult> {
    run_function_playground_with(interp, target, args, &PlaygroundConfig::default())
}

/// [`run_function_playground`] with an explicit configuration.
pub fn run_function_playground_with(
    interp: &mut Interpreter,
    target: impl Into<Target>,
    args: CallArgs,
    config: &PlaygroundConfig,
) -> Result<PlaygroundResult> {
    let target = target.into();
    let report = ExecutionMonitor::new(interp)
        .with_mode(config.capture_mode)
        .run_under_monitor(&target, args)?;

    if let Outcome::Raised(exception) = &report.outcome {
        tracing::debug!("{} raised {}", report.session.function(), exception);
    }

    Ok(PlaygroundResult {
        session: report.session.id(),
        function: report.session.function().to_string(),
        code: report.session.target(),
        outcome: report.outcome,
        snapshot: report.snapshot,
        activations: report.activations,
    })
}

/// Anything bindings can be extracted from.
pub trait LocalsSource {
    fn locals_snapshot(&self) -> VariableSnapshot;
}

impl LocalsSource for Activation<'_> {
    fn locals_snapshot(&self) -> VariableSnapshot {
        capture_bindings(self.locals())
    }
}

impl LocalsSource for CaptureSession {
    fn locals_snapshot(&self) -> VariableSnapshot {
        self.snapshot().cloned().unwrap_or_default()
    }
}

impl LocalsSource for PlaygroundResult {
    fn locals_snapshot(&self) -> VariableSnapshot {
        self.snapshot.clone()
    }
}

/// Snapshot the bindings of `source` without running anything.
///
/// For a live [`Activation`] (inside a caller's own hook) this captures the
/// current bindings; for a session or result it returns what was captured.
pub fn extract_locals<S: LocalsSource + ?Sized>(source: &S) -> VariableSnapshot {
    source.locals_snapshot()
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use troy_runtime::FrameId;

    use super::*;
    use crate::config::CaptureMode;

    #[test]
    fn test_into_result() {
        let mut rt = Interpreter::from_source(
            r#"
fn ok() -> i64 { let x = 5; x }
fn bad() { let y = 1; throw!(ValueError, "no"); }
"#,
        )
        .unwrap();

        let (value, snapshot) = run_function_playground(&mut rt, "ok", CallArgs::new())
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(value, Value::Int(5));
        assert_eq!(snapshot.value("x"), Some(Value::Int(5)));

        let err = run_function_playground(&mut rt, "bad", CallArgs::new())
            .unwrap()
            .into_result()
            .unwrap_err();
        let PlaygroundError::TargetRaised { exception, snapshot } = err else {
            panic!("expected TargetRaised");
        };
        assert_eq!(exception.kind(), "ValueError");
        assert_eq!(snapshot.value("y"), Some(Value::Int(1)));
    }

    #[test]
    fn test_extract_locals_from_activation() {
        let mut locals = IndexMap::new();
        locals.insert("n".to_string(), Value::Int(4));
        let activation = Activation::new(FrameId::new(1), CodeId::new(0), "f", 1, 1, &locals);
        let snapshot = extract_locals(&activation);
        assert_eq!(snapshot.value("n"), Some(Value::Int(4)));
    }

    #[test]
    fn test_extract_locals_from_session_and_result() {
        let session = CaptureSession::new(SessionId::new(), CodeId::new(0), "f", 0, CaptureMode::Outermost);
        assert!(extract_locals(&session).is_empty());

        let mut rt = Interpreter::from_source("fn f(a: i64) { let b = a * 2; }").unwrap();
        let result = run_function_playground(&mut rt, "f", CallArgs::new().arg(3)).unwrap();
        let snapshot = extract_locals(&result);
        assert_eq!(snapshot.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(&snapshot, result.snapshot());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::Returned(Value::Int(1))).unwrap();
        assert_eq!(json, serde_json::json!({"returned": 1}));
    }
}
