//! Execution event channel.
//!
//! The interpreter reports four kinds of events for every script activation:
//!
//! ```text
//! call ──► line ──► line ──► ... ──► return(value)
//!                         └────────► exception(exc)   (unwinding out of the frame)
//! ```
//!
//! A single [`TraceHook`] may be installed per interpreter. Installation
//! hands back a [`HookGuard`]; dropping the guard uninstalls the hook, which
//! also happens while a panic unwinds through the caller.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::exception::Exception;
use crate::value::{CodeId, Value};

/// Serial number of one activation. Never reused within an interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameId(u64);

impl FrameId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame_{}", self.0)
    }
}

/// Borrowed view of one live activation.
///
/// Only valid for the duration of the event callback it was handed to.
#[derive(Debug, Clone, Copy)]
pub struct Activation<'a> {
    frame_id: FrameId,
    code: CodeId,
    function: &'a str,
    depth: usize,
    line: usize,
    locals: &'a IndexMap<String, Value>,
}

impl<'a> Activation<'a> {
    pub fn new(
        frame_id: FrameId,
        code: CodeId,
        function: &'a str,
        depth: usize,
        line: usize,
        locals: &'a IndexMap<String, Value>,
    ) -> Self {
        Self {
            frame_id,
            code,
            function,
            depth,
            line,
            locals,
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn code(&self) -> CodeId {
        self.code
    }

    pub fn function(&self) -> &'a str {
        self.function
    }

    /// Call-stack depth; the first script activation has depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Line currently executing (the `fn` line until the first statement).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Current bindings in binding order.
    pub fn locals(&self) -> &'a IndexMap<String, Value> {
        self.locals
    }
}

/// What happened.
#[derive(Debug, Clone, Copy)]
pub enum EventKind<'a> {
    /// Activation entered, parameters bound.
    Call,
    /// About to execute the statement at `activation.line()`.
    Line,
    /// Activation returning this value.
    Return(&'a Value),
    /// Exception unwinding out of the activation.
    Exception(&'a Exception),
}

impl EventKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Call => "call",
            EventKind::Line => "line",
            EventKind::Return(_) => "return",
            EventKind::Exception(_) => "exception",
        }
    }

    /// Whether this event ends the activation.
    pub fn is_exit(&self) -> bool {
        matches!(self, EventKind::Return(_) | EventKind::Exception(_))
    }
}

/// One event on the channel.
#[derive(Debug, Clone, Copy)]
pub struct TraceEvent<'a> {
    pub kind: EventKind<'a>,
    pub activation: Activation<'a>,
}

/// Receiver of execution events.
pub trait TraceHook {
    fn on_event(&mut self, event: &TraceEvent<'_>);
}

impl<F> TraceHook for F
where
    F: FnMut(&TraceEvent<'_>),
{
    fn on_event(&mut self, event: &TraceEvent<'_>) {
        self(event)
    }
}

#[derive(Default)]
struct SlotState {
    hook: Option<Box<dyn TraceHook>>,
    installed: bool,
    generation: u64,
}

/// The interpreter's single hook slot.
#[derive(Clone, Default)]
pub(crate) struct HookSlot {
    state: Rc<RefCell<SlotState>>,
}

impl HookSlot {
    pub(crate) fn install(&self, hook: Box<dyn TraceHook>) -> Option<HookGuard> {
        let mut state = self.state.borrow_mut();
        if state.installed {
            return None;
        }
        state.generation += 1;
        state.installed = true;
        state.hook = Some(hook);
        Some(HookGuard {
            slot: self.clone(),
            generation: state.generation,
        })
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.state.borrow().installed
    }

    /// Deliver an event.
    ///
    /// The hook is moved out of the slot for the duration of the call, so
    /// anything the hook triggers is never reported back to it.
    pub(crate) fn dispatch(&self, event: &TraceEvent<'_>) {
        let (hook, generation) = {
            let mut state = self.state.borrow_mut();
            (state.hook.take(), state.generation)
        };
        let Some(mut hook) = hook else {
            return;
        };

        hook.on_event(event);

        let mut state = self.state.borrow_mut();
        if state.installed && state.generation == generation && state.hook.is_none() {
            state.hook = Some(hook);
        }
    }

    fn clear(&self, generation: u64) {
        // Dropping the hook may run arbitrary Drop code; release the borrow first.
        let hook = {
            let mut state = self.state.borrow_mut();
            if state.generation != generation || !state.installed {
                return;
            }
            state.installed = false;
            state.hook.take()
        };
        drop(hook);
    }
}

/// Keeps a hook installed. Dropping it uninstalls the hook.
#[must_use = "the hook is uninstalled as soon as the guard is dropped"]
pub struct HookGuard {
    slot: HookSlot,
    generation: u64,
}

impl HookGuard {
    /// Uninstall the hook now.
    pub fn uninstall(self) {
        drop(self);
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        self.slot.clear(self.generation);
    }
}

impl fmt::Debug for HookGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookGuard")
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(locals: &IndexMap<String, Value>) -> TraceEvent<'_> {
        TraceEvent {
            kind: EventKind::Line,
            activation: Activation::new(FrameId::new(1), CodeId::new(0), "f", 1, 1, locals),
        }
    }

    #[test]
    fn test_install_and_drop_guard() {
        let slot = HookSlot::default();
        let guard = slot.install(Box::new(|_: &TraceEvent<'_>| {})).unwrap();
        assert!(slot.is_installed());
        assert!(slot.install(Box::new(|_: &TraceEvent<'_>| {})).is_none());
        drop(guard);
        assert!(!slot.is_installed());
    }

    #[test]
    fn test_dispatch_reaches_hook() {
        let slot = HookSlot::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _guard = slot
            .install(Box::new(move |event: &TraceEvent<'_>| {
                sink.borrow_mut().push(event.kind.name());
            }))
            .unwrap();

        let locals = IndexMap::new();
        slot.dispatch(&event_at(&locals));
        slot.dispatch(&event_at(&locals));
        assert_eq!(*seen.borrow(), vec!["line", "line"]);
    }

    #[test]
    fn test_dispatch_after_uninstall_is_silent() {
        let slot = HookSlot::default();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let guard = slot
            .install(Box::new(move |_: &TraceEvent<'_>| *sink.borrow_mut() += 1))
            .unwrap();
        guard.uninstall();

        let locals = IndexMap::new();
        slot.dispatch(&event_at(&locals));
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_stale_guard_does_not_remove_newer_hook() {
        let slot = HookSlot::default();
        let first = slot.install(Box::new(|_: &TraceEvent<'_>| {})).unwrap();
        let generation = first.generation;
        drop(first);
        let _second = slot.install(Box::new(|_: &TraceEvent<'_>| {})).unwrap();
        slot.clear(generation);
        assert!(slot.is_installed());
    }

    struct PanickingHook;

    impl TraceHook for PanickingHook {
        fn on_event(&mut self, _event: &TraceEvent<'_>) {
            panic!("hook failure");
        }
    }

    #[test]
    fn test_panicking_hook_is_not_restored() {
        let slot = HookSlot::default();
        let guard = slot.install(Box::new(PanickingHook)).unwrap();
        let locals = IndexMap::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            slot.dispatch(&event_at(&locals));
        }));
        assert!(result.is_err());
        drop(guard);
        assert!(!slot.is_installed());
    }
}
