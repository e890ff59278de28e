//! Tree-walking interpreter over the syn AST.
//!
//! # Module Structure
//!
//! - `eval` - statements and expressions
//! - `ops` - operators
//! - `methods` - built-in methods on values
//! - `macros` - `vec!`, `format!`, `println!`, `panic!`, `throw!`, assertions
//!
//! Every script call pushes a frame with flat, per-activation bindings and
//! reports `call`/`line`/`return`/`exception` events to the installed
//! [`TraceHook`], if any.

mod eval;
mod macros;
mod methods;
mod ops;

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::args::CallArgs;
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::exception::Exception;
use crate::program::{FunctionDef, Program};
use crate::trace::{Activation, EventKind, FrameId, HookGuard, HookSlot, TraceEvent, TraceHook};
use crate::value::{CodeId, Value};

/// Signature of a native (host) function.
///
/// Natives run without an activation of their own and emit no events.
/// They receive the interpreter and may call back into script code.
pub type NativeFn = dyn Fn(&mut Interpreter, &[Value]) -> std::result::Result<Value, Exception>;

/// Remaining native stack below which evaluation moves to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each stack segment allocated for deep evaluation.
pub(crate) const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Non-local control flow while executing a function body.
pub(crate) enum Unwind {
    Raise(Exception),
    Break(Option<Value>),
    Continue,
    Return(Value),
}

impl From<Exception> for Unwind {
    fn from(exc: Exception) -> Self {
        Unwind::Raise(exc)
    }
}

pub(crate) type Flow<T> = std::result::Result<T, Unwind>;

/// One live activation.
struct Frame {
    id: FrameId,
    code: CodeId,
    name: Rc<str>,
    depth: usize,
    line: usize,
    locals: IndexMap<String, Value>,
}

impl Frame {
    fn activation(&self) -> Activation<'_> {
        Activation::new(self.id, self.code, &self.name, self.depth, self.line, &self.locals)
    }
}

/// The script interpreter.
pub struct Interpreter {
    program: Rc<Program>,
    natives: FxHashMap<String, Rc<NativeFn>>,
    frames: Vec<Frame>,
    hooks: HookSlot,
    config: RuntimeConfig,
    output: String,
    next_frame: u64,
}

impl Interpreter {
    /// Create an interpreter with the default configuration.
    pub fn new(program: Program) -> Self {
        Self::with_config(program, RuntimeConfig::default())
    }

    pub fn with_config(program: Program, config: RuntimeConfig) -> Self {
        let mut interp = Self {
            program: Rc::new(program),
            natives: FxHashMap::default(),
            frames: Vec::new(),
            hooks: HookSlot::default(),
            config,
            output: String::new(),
            next_frame: 1,
        };
        if interp.config.builtins {
            interp.register_builtins();
        }
        interp
    }

    /// Parse `source` and create an interpreter for it.
    pub fn from_source(source: &str) -> Result<Self> {
        Ok(Self::new(Program::parse(source)?))
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Resolve a script function by name.
    pub fn resolve(&self, name: &str) -> Option<CodeId> {
        self.program.resolve(name)
    }

    /// Number of script activations currently on the stack.
    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    /// Text written by `print!`/`println!` so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Register a native function callable from scripts by `name`.
    ///
    /// Script functions take precedence over natives of the same name.
    pub fn register_native<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Interpreter, &[Value]) -> std::result::Result<Value, Exception> + 'static,
    {
        self.natives.insert(name.into(), Rc::new(f));
    }

    fn register_builtins(&mut self) {
        self.register_native("open", |_, args| match args {
            [Value::Str(label)] => Ok(Value::handle("file", label.as_ref())),
            _ => Err(Exception::type_error("open() takes a single str argument")),
        });
        self.register_native("len", |_, args| match args {
            [value] => methods::length(value).map(Value::Int),
            _ => Err(Exception::type_error(format!(
                "len() takes 1 argument but {} were given",
                args.len()
            ))),
        });
    }

    /// Install the trace hook.
    ///
    /// The hook stays installed until the returned guard is dropped.
    pub fn install_hook(&mut self, hook: Box<dyn TraceHook>) -> Result<HookGuard> {
        if !self.config.allow_trace_hooks {
            return Err(RuntimeError::HooksDisabled);
        }
        let guard = self
            .hooks
            .install(hook)
            .ok_or(RuntimeError::HookAlreadyInstalled)?;
        tracing::debug!("Trace hook installed at stack depth {}", self.frames.len());
        Ok(guard)
    }

    /// Whether a trace hook is currently installed.
    pub fn has_hook(&self) -> bool {
        self.hooks.is_installed()
    }

    /// Call a script function by name.
    pub fn call_by_name(&mut self, name: &str, args: CallArgs) -> std::result::Result<Value, Exception> {
        let code = self.resolve(name).ok_or_else(|| Exception::name_error(name))?;
        self.call(code, args)
    }

    /// Call a script function.
    ///
    /// If a native panics, the stack is restored to its depth at entry before
    /// the panic continues.
    pub fn call(&mut self, code: CodeId, args: CallArgs) -> std::result::Result<Value, Exception> {
        let base = self.frames.len();
        match catch_unwind(AssertUnwindSafe(|| self.call_code(code, args))) {
            Ok(result) => result,
            Err(payload) => {
                self.frames.truncate(base);
                resume_unwind(payload)
            }
        }
    }

    fn call_code(&mut self, code: CodeId, args: CallArgs) -> std::result::Result<Value, Exception> {
        let program = Rc::clone(&self.program);
        let func = program
            .function(code)
            .ok_or_else(|| Exception::name_error(&code.to_string()))?;
        let locals = bind_arguments(func, args)?;
        self.invoke(func, locals)
    }

    /// Run `func` in a new activation.
    ///
    /// Script recursion is bounded by `max_call_depth`; the native stack
    /// grows on demand so that bound is reachable on any thread.
    fn invoke(
        &mut self,
        func: &FunctionDef,
        locals: IndexMap<String, Value>,
    ) -> std::result::Result<Value, Exception> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.run_activation(func, locals))
    }

    fn run_activation(
        &mut self,
        func: &FunctionDef,
        locals: IndexMap<String, Value>,
    ) -> std::result::Result<Value, Exception> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(Exception::new(
                "RecursionError",
                format!("maximum recursion depth exceeded while calling {}", func.name()),
            ));
        }

        let id = FrameId::new(self.next_frame);
        self.next_frame += 1;
        self.frames.push(Frame {
            id,
            code: func.code(),
            name: Rc::from(func.name()),
            depth: self.frames.len() + 1,
            line: func.line(),
            locals,
        });
        self.emit(EventKind::Call);

        let outcome = match self.exec_block(func.body()) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Raise(exc)) => Err(exc),
            Err(Unwind::Break(_)) => Err(Exception::unsupported("`break` outside of a loop")),
            Err(Unwind::Continue) => Err(Exception::unsupported("`continue` outside of a loop")),
        };

        match outcome {
            Ok(value) => {
                self.emit(EventKind::Return(&value));
                self.frames.pop();
                Ok(value)
            }
            Err(mut exc) => {
                if let Some(frame) = self.frames.last() {
                    exc.push_frame(&frame.name, frame.line);
                }
                self.emit(EventKind::Exception(&exc));
                self.frames.pop();
                Err(exc)
            }
        }
    }

    /// Call a function value or name from script code.
    fn call_function(&mut self, code: CodeId, args: Vec<Value>) -> Flow<Value> {
        let program = Rc::clone(&self.program);
        let func = program
            .function(code)
            .ok_or_else(|| Exception::name_error(&code.to_string()))?;
        let locals = bind_arguments(func, CallArgs::positional_values(args))?;
        Ok(self.invoke(func, locals)?)
    }

    fn call_native(&mut self, name: &str, args: Vec<Value>) -> Option<Flow<Value>> {
        let native = self.natives.get(name).cloned()?;
        Some(native(self, &args).map_err(Unwind::Raise))
    }

    fn emit(&self, kind: EventKind<'_>) {
        if !self.hooks.is_installed() {
            return;
        }
        if let Some(frame) = self.frames.last() {
            self.hooks.dispatch(&TraceEvent {
                kind,
                activation: frame.activation(),
            });
        }
    }

    fn frame_mut(&mut self) -> std::result::Result<&mut Frame, Exception> {
        self.frames
            .last_mut()
            .ok_or_else(|| Exception::new("RuntimeError", "no active frame"))
    }

    fn lookup_local(&self, name: &str) -> Option<Value> {
        self.frames.last().and_then(|f| f.locals.get(name).cloned())
    }

    fn set_local(&mut self, name: &str, value: Value) -> std::result::Result<(), Exception> {
        let frame = self.frame_mut()?;
        if let Some(slot) = frame.locals.get_mut(name) {
            *slot = value;
        } else {
            frame.locals.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn mark_line(&mut self, line: usize) -> std::result::Result<(), Exception> {
        self.frame_mut()?.line = line;
        self.emit(EventKind::Line);
        Ok(())
    }

    fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

/// Bind call arguments to a function's parameters.
fn bind_arguments(
    func: &FunctionDef,
    args: CallArgs,
) -> std::result::Result<IndexMap<String, Value>, Exception> {
    let params = func.params();
    let (positional, mut named) = args.into_parts();

    if positional.len() > params.len() {
        return Err(Exception::type_error(format!(
            "{}() takes {} positional arguments but {} were given",
            func.name(),
            params.len(),
            positional.len()
        )));
    }

    let mut locals = IndexMap::with_capacity(params.len());
    let mut positional = positional.into_iter();
    for param in params {
        let value = match positional.next() {
            Some(value) => {
                if named.contains_key(param) {
                    return Err(Exception::type_error(format!(
                        "{}() got multiple values for argument '{}'",
                        func.name(),
                        param
                    )));
                }
                value
            }
            None => named.shift_remove(param).ok_or_else(|| {
                Exception::type_error(format!(
                    "{}() missing required argument '{}'",
                    func.name(),
                    param
                ))
            })?,
        };
        locals.insert(param.clone(), value);
    }

    if let Some((name, _)) = named.first() {
        return Err(Exception::type_error(format!(
            "{}() got an unexpected keyword argument '{}'",
            func.name(),
            name
        )));
    }

    Ok(locals)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn interp(source: &str) -> Interpreter {
        Interpreter::from_source(source).unwrap()
    }

    #[test]
    fn test_call_returns_tail_value() {
        let mut rt = interp("fn f() -> i64 { let a = 1; let b = a + 1; b }");
        assert_eq!(rt.call_by_name("f", CallArgs::new()).unwrap(), Value::Int(2));
        assert_eq!(rt.stack_depth(), 0);
    }

    #[test]
    fn test_named_arguments() {
        let mut rt = interp("fn sub(a: i64, b: i64) -> i64 { a - b }");
        let args = CallArgs::new().named("b", 1).named("a", 10);
        assert_eq!(rt.call_by_name("sub", args).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_argument_errors() {
        let mut rt = interp("fn f(a: i64) -> i64 { a }");

        let err = rt.call_by_name("f", CallArgs::new()).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
        assert!(err.message().contains("missing required argument 'a'"));

        let err = rt.call_by_name("f", CallArgs::new().arg(1).arg(2)).unwrap_err();
        assert!(err.message().contains("takes 1 positional arguments but 2 were given"));

        let err = rt.call_by_name("f", CallArgs::new().arg(1).named("a", 2)).unwrap_err();
        assert!(err.message().contains("multiple values"));

        let err = rt.call_by_name("f", CallArgs::new().arg(1).named("z", 2)).unwrap_err();
        assert!(err.message().contains("unexpected keyword argument 'z'"));
    }

    #[test]
    fn test_unknown_function() {
        let mut rt = interp("fn f() {}");
        let err = rt.call_by_name("g", CallArgs::new()).unwrap_err();
        assert_eq!(err.kind(), "NameError");
    }

    #[test]
    fn test_recursion_limit() {
        let program = Program::parse("fn down(n: i64) -> i64 { down(n + 1) }").unwrap();
        let mut rt = Interpreter::with_config(program, RuntimeConfig::default().with_max_call_depth(16));
        let err = rt.call_by_name("down", CallArgs::new().arg(0)).unwrap_err();
        assert_eq!(err.kind(), "RecursionError");
        assert_eq!(err.traceback().len(), 16);
        assert_eq!(rt.stack_depth(), 0);
    }

    #[test]
    fn test_default_depth_limit_is_reachable() {
        let mut rt = interp(
            r#"
fn down(n: i64) -> i64 {
    if n == 0 {
        return 0;
    }
    let m = n - 1;
    let r = down(m);
    r + 1
}
"#,
        );
        let limit = rt.config().max_call_depth as i64;

        let value = rt.call_by_name("down", CallArgs::new().arg(limit - 1)).unwrap();
        assert_eq!(value, Value::Int(limit - 1));

        let err = rt.call_by_name("down", CallArgs::new().arg(limit + 10)).unwrap_err();
        assert_eq!(err.kind(), "RecursionError");
        assert_eq!(err.traceback().len(), limit as usize);
        assert_eq!(rt.stack_depth(), 0);
    }

    #[test]
    fn test_deep_limit_on_small_thread() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let program = Program::parse("fn down(n: i64) -> i64 { if n == 0 { 0 } else { down(n - 1) + 1 } }").unwrap();
                let mut rt = Interpreter::with_config(program, RuntimeConfig::default().with_max_call_depth(2000));
                let value = match rt.call_by_name("down", CallArgs::new().arg(1500)) {
                    Ok(Value::Int(n)) => Some(n),
                    _ => None,
                };
                let err = rt
                    .call_by_name("down", CallArgs::new().arg(5000))
                    .err()
                    .map(|e| e.kind().to_string());
                (value, err, rt.stack_depth())
            })
            .unwrap();
        let (value, err, depth) = handle.join().unwrap();
        assert_eq!(value, Some(1500));
        assert_eq!(err.as_deref(), Some("RecursionError"));
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_hooks_disabled() {
        let program = Program::parse("fn f() {}").unwrap();
        let mut rt = Interpreter::with_config(program, RuntimeConfig::without_hooks());
        let err = rt.install_hook(Box::new(|_: &TraceEvent<'_>| {})).unwrap_err();
        assert!(matches!(err, RuntimeError::HooksDisabled));
    }

    #[test]
    fn test_second_hook_rejected() {
        let mut rt = interp("fn f() {}");
        let _guard = rt.install_hook(Box::new(|_: &TraceEvent<'_>| {})).unwrap();
        let err = rt.install_hook(Box::new(|_: &TraceEvent<'_>| {})).unwrap_err();
        assert!(matches!(err, RuntimeError::HookAlreadyInstalled));
    }

    #[test]
    fn test_event_sequence() {
        let mut rt = interp(
            r#"
fn f() -> i64 {
    let a = 1;
    a + 1
}
"#,
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let guard = rt
            .install_hook(Box::new(move |event: &TraceEvent<'_>| {
                sink.borrow_mut()
                    .push((event.kind.name(), event.activation.line(), event.activation.depth()));
            }))
            .unwrap();
        rt.call_by_name("f", CallArgs::new()).unwrap();
        drop(guard);

        assert_eq!(
            *events.borrow(),
            vec![("call", 2, 1), ("line", 3, 1), ("line", 4, 1), ("return", 4, 1)]
        );
        assert!(!rt.has_hook());
    }

    #[test]
    fn test_native_panic_restores_stack() {
        let mut rt = interp("fn f() { boom(); }");
        rt.register_native("boom", |_, _| panic!("native failure"));
        let result = catch_unwind(AssertUnwindSafe(|| rt.call_by_name("f", CallArgs::new())));
        assert!(result.is_err());
        assert_eq!(rt.stack_depth(), 0);
    }

    #[test]
    fn test_native_can_call_back() {
        let mut rt = interp("fn double(x: i64) -> i64 { x * 2 } fn f() -> i64 { twice(21) }");
        rt.register_native("twice", |rt, args| rt.call_by_name("double", CallArgs::positional_values(args.to_vec())));
        assert_eq!(rt.call_by_name("f", CallArgs::new()).unwrap(), Value::Int(42));
    }
}
