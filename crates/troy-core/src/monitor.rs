//! Execution monitor.
//!
//! Runs one invocation with a capture hook installed and guarantees the hook
//! is gone afterwards, whatever way the invocation ends.
//!
//! ```text
//!  run_under_monitor
//!    ├─ SessionLock::acquire      (one session per thread)
//!    ├─ Target::resolve
//!    ├─ install_hook(CaptureHook) ──► HookGuard
//!    ├─ Interpreter::call
//!    │     events ──► CaptureSession::observe ──► ScopeMatcher ──► codec
//!    └─ drop HookGuard, drop SessionLock
//! ```
//!
//! Both guards are RAII values, so a panic unwinding out of a native or out
//! of the hook itself still uninstalls the hook and releases the lock.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use troy_runtime::{
    CallArgs, CodeId, FrameId, FunctionRef, Interpreter, TraceEvent, TraceHook, Value,
};
use uuid::Uuid;

use crate::codec::{VariableSnapshot, capture_bindings};
use crate::config::CaptureMode;
use crate::error::{PlaygroundError, Result};
use crate::playground::Outcome;
use crate::scope::{ScopeMatcher, ScopeVerdict};

/// Identity of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

thread_local! {
    static ACTIVE_SESSION: Cell<Option<SessionId>> = const { Cell::new(None) };
}

/// Marks a session as active on this thread until dropped.
struct SessionLock {
    id: SessionId,
}

impl SessionLock {
    fn acquire(id: SessionId) -> Result<Self> {
        ACTIVE_SESSION.with(|active| match active.get() {
            Some(active) => Err(PlaygroundError::ReentrancyConflict { active }),
            None => {
                active.set(Some(id));
                Ok(Self { id })
            }
        })
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        ACTIVE_SESSION.with(|active| {
            if active.get() == Some(self.id) {
                active.set(None);
            }
        });
    }
}

/// The session active on the current thread, if any.
pub fn active_session() -> Option<SessionId> {
    ACTIVE_SESSION.with(Cell::get)
}

/// What to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A function in the loaded program, by name.
    Name(String),
    /// A function in the loaded program, by code identity.
    Code(CodeId),
    /// A function value.
    Function(FunctionRef),
}

impl Target {
    /// Resolve to a code identity and the function's name.
    pub fn resolve(&self, interp: &Interpreter) -> Result<(CodeId, String)> {
        let code = match self {
            Target::Name(name) => interp
                .resolve(name)
                .ok_or_else(|| PlaygroundError::UnknownTarget(name.clone()))?,
            Target::Code(code) => *code,
            Target::Function(func) => func.code,
        };
        let func = interp
            .program()
            .function(code)
            .ok_or_else(|| PlaygroundError::UnknownTarget(self.to_string()))?;
        Ok((code, func.name().to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => f.write_str(name),
            Target::Code(code) => write!(f, "{}", code),
            Target::Function(func) => write!(f, "{}", func.name),
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<CodeId> for Target {
    fn from(code: CodeId) -> Self {
        Target::Code(code)
    }
}

impl From<FunctionRef> for Target {
    fn from(func: FunctionRef) -> Self {
        Target::Function(func)
    }
}

impl TryFrom<Value> for Target {
    type Error = PlaygroundError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Function(func) => Ok(Target::Function(func)),
            other => Err(PlaygroundError::UnknownTarget(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }
}

/// Snapshot of one nested activation of the target code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationSnapshot {
    pub depth: usize,
    pub frame: FrameId,
    pub snapshot: VariableSnapshot,
}

/// Event counts for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub total: usize,
    pub own_scope: usize,
    pub nested: usize,
    pub unrelated: usize,
    pub captures: usize,
}

/// State of one observed invocation.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    id: SessionId,
    target: CodeId,
    function: String,
    mode: CaptureMode,
    matcher: ScopeMatcher,
    snapshot: Option<VariableSnapshot>,
    activations: Vec<ActivationSnapshot>,
    capturing: bool,
    stats: EventStats,
}

impl CaptureSession {
    /// Session for `target` about to be invoked on a stack `base_depth` deep.
    pub fn new(
        id: SessionId,
        target: CodeId,
        function: impl Into<String>,
        base_depth: usize,
        mode: CaptureMode,
    ) -> Self {
        Self {
            id,
            target,
            function: function.into(),
            mode,
            matcher: ScopeMatcher::new(target, base_depth),
            snapshot: None,
            activations: Vec::new(),
            capturing: false,
            stats: EventStats::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> CodeId {
        self.target
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn target_depth(&self) -> usize {
        self.matcher.target_depth()
    }

    /// Snapshot of the observed activation, once it has exited.
    pub fn snapshot(&self) -> Option<&VariableSnapshot> {
        self.snapshot.as_ref()
    }

    /// Nested activations captured in [`CaptureMode::AllActivations`].
    pub fn activations(&self) -> &[ActivationSnapshot] {
        &self.activations
    }

    pub fn stats(&self) -> EventStats {
        self.stats
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Route one event.
    pub fn observe(&mut self, event: &TraceEvent<'_>) {
        if self.capturing {
            return;
        }
        self.stats.total += 1;

        let activation = &event.activation;
        let verdict = self.matcher.classify(activation);
        tracing::trace!(
            "session {} {} {}@{} line {}: {:?}",
            self.id,
            event.kind.name(),
            activation.function(),
            activation.depth(),
            activation.line(),
            verdict
        );

        match verdict {
            ScopeVerdict::OwnScope => {
                self.stats.own_scope += 1;
                if event.kind.is_exit() {
                    self.snapshot = Some(self.capture(event));
                }
            }
            ScopeVerdict::NestedIgnore => {
                self.stats.nested += 1;
                if self.mode == CaptureMode::AllActivations
                    && event.kind.is_exit()
                    && activation.code() == self.target
                {
                    let snapshot = self.capture(event);
                    self.activations.push(ActivationSnapshot {
                        depth: activation.depth(),
                        frame: activation.frame_id(),
                        snapshot,
                    });
                }
            }
            ScopeVerdict::UnrelatedIgnore => self.stats.unrelated += 1,
        }
    }

    fn capture(&mut self, event: &TraceEvent<'_>) -> VariableSnapshot {
        self.capturing = true;
        let snapshot = capture_bindings(event.activation.locals());
        self.capturing = false;
        self.stats.captures += 1;
        snapshot
    }
}

/// Hook forwarding events to a shared session.
struct CaptureHook {
    session: Rc<RefCell<CaptureSession>>,
}

impl TraceHook for CaptureHook {
    fn on_event(&mut self, event: &TraceEvent<'_>) {
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.observe(event);
        }
    }
}

/// Result of one monitored invocation.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub outcome: Outcome,
    pub snapshot: VariableSnapshot,
    pub activations: Vec<ActivationSnapshot>,
    pub session: CaptureSession,
}

/// Runs invocations under a capture hook.
pub struct ExecutionMonitor<'a> {
    interp: &'a mut Interpreter,
    mode: CaptureMode,
}

impl<'a> ExecutionMonitor<'a> {
    pub fn new(interp: &'a mut Interpreter) -> Self {
        Self {
            interp,
            mode: CaptureMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Invoke `target` with `args` and capture its bindings at exit.
    ///
    /// An exception raised by the target is part of the report, not an
    /// error. Errors mean the target was never run.
    pub fn run_under_monitor(self, target: &Target, args: CallArgs) -> Result<MonitorReport> {
        let id = SessionId::new();
        let _lock = SessionLock::acquire(id)?;

        let (code, function) = target.resolve(self.interp)?;
        let base_depth = self.interp.stack_depth();
        let session = Rc::new(RefCell::new(CaptureSession::new(
            id, code, &function, base_depth, self.mode,
        )));

        let guard = self
            .interp
            .install_hook(Box::new(CaptureHook {
                session: Rc::clone(&session),
            }))
            .map_err(PlaygroundError::from_install)?;
        tracing::debug!(
            "Capture session {} started for {} at depth {} ({:?})",
            id,
            function,
            base_depth + 1,
            self.mode
        );

        let result = self.interp.call(code, args);
        guard.uninstall();

        let session = match Rc::try_unwrap(session) {
            Ok(session) => session.into_inner(),
            Err(shared) => RefCell::clone(&shared).into_inner(),
        };
        let stats = session.stats();
        tracing::debug!(
            "Capture session {} finished for {}: {} events, {} own, {} nested, {} unrelated, {} captures",
            id,
            function,
            stats.total,
            stats.own_scope,
            stats.nested,
            stats.unrelated,
            stats.captures
        );

        let outcome = match result {
            Ok(value) => Outcome::Returned(value),
            Err(exception) => Outcome::Raised(exception),
        };
        Ok(MonitorReport {
            outcome,
            snapshot: session.snapshot().cloned().unwrap_or_default(),
            activations: session.activations().to_vec(),
            session,
        })
    }
}
