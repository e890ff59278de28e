//! Statement and expression evaluation.

use std::rc::Rc;

use quote::ToTokens;
use syn::spanned::Spanned;
use syn::{BinOp, Block, Expr, Lit, Local, Member, Pat, RangeLimits, Stmt, UnOp};

use super::ops::{self, Arith};
use super::{Flow, Interpreter, STACK_RED_ZONE, STACK_SEGMENT, Unwind, methods};
use crate::exception::Exception;
use crate::value::{FunctionRef, IterObject, IterState, RangeValue, Value};

/// Render a syntax node for error messages.
pub(super) fn render(node: &impl ToTokens) -> String {
    node.to_token_stream().to_string()
}

impl Interpreter {
    pub(super) fn exec_block(&mut self, block: &Block) -> Flow<Value> {
        let mut last = Value::Unit;
        for stmt in &block.stmts {
            self.mark_line(stmt.span().start().line)?;
            last = self.exec_stmt(stmt)?;
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Flow<Value> {
        match stmt {
            Stmt::Local(local) => {
                self.exec_local(local)?;
                Ok(Value::Unit)
            }
            Stmt::Expr(expr, semi) => {
                let value = self.eval(expr)?;
                Ok(if semi.is_some() { Value::Unit } else { value })
            }
            Stmt::Macro(stmt) => {
                let value = self.eval_macro(&stmt.mac)?;
                Ok(if stmt.semi_token.is_some() { Value::Unit } else { value })
            }
            Stmt::Item(item) => Err(Exception::unsupported(format!(
                "nested item `{}`",
                render(item)
            ))
            .into()),
        }
    }

    fn exec_local(&mut self, local: &Local) -> Flow<()> {
        let Some(init) = &local.init else {
            // `let x;` binds nothing until the first assignment.
            return Ok(());
        };
        if init.diverge.is_some() {
            return Err(Exception::unsupported("let-else").into());
        }
        let value = self.eval(&init.expr)?;
        self.bind_pattern(&local.pat, value)
    }

    pub(super) fn bind_pattern(&mut self, pat: &Pat, value: Value) -> Flow<()> {
        match pat {
            Pat::Ident(ident) if ident.subpat.is_none() => {
                self.set_local(&ident.ident.to_string(), value)?;
                Ok(())
            }
            Pat::Type(typed) => self.bind_pattern(&typed.pat, value),
            Pat::Paren(paren) => self.bind_pattern(&paren.pat, value),
            Pat::Wild(_) => Ok(()),
            Pat::Tuple(tuple) => {
                let Value::Tuple(items) = &value else {
                    return Err(Exception::type_error(format!(
                        "cannot destructure {} into a tuple pattern",
                        value.type_name()
                    ))
                    .into());
                };
                if items.len() != tuple.elems.len() {
                    return Err(Exception::type_error(format!(
                        "expected a tuple of {} elements, found {}",
                        tuple.elems.len(),
                        items.len()
                    ))
                    .into());
                }
                for (pat, item) in tuple.elems.iter().zip(items.iter()) {
                    self.bind_pattern(pat, item.clone())?;
                }
                Ok(())
            }
            other => Err(Exception::unsupported(format!("pattern `{}`", render(other))).into()),
        }
    }

    pub(super) fn eval(&mut self, expr: &Expr) -> Flow<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.eval_expr(expr))
    }

    fn eval_expr(&mut self, expr: &Expr) -> Flow<Value> {
        match expr {
            Expr::Lit(lit) => Ok(eval_lit(&lit.lit)?),
            Expr::Path(path) => self.eval_path(path),
            Expr::Paren(paren) => self.eval(&paren.expr),
            Expr::Group(group) => self.eval(&group.expr),
            Expr::Reference(reference) => self.eval(&reference.expr),
            Expr::Block(block) => {
                if block.label.is_some() {
                    return Err(Exception::unsupported("labeled block").into());
                }
                self.exec_block(&block.block)
            }
            Expr::Unary(unary) => {
                let value = self.eval(&unary.expr)?;
                Ok(eval_unary(&unary.op, value)?)
            }
            Expr::Binary(binary) => self.eval_binary(binary),
            Expr::Assign(assign) => {
                let value = self.eval(&assign.right)?;
                self.assign_to(&assign.left, value)?;
                Ok(Value::Unit)
            }
            Expr::If(expr_if) => {
                let cond = self.eval_condition(&expr_if.cond)?;
                if cond {
                    self.exec_block(&expr_if.then_branch)
                } else if let Some((_, else_branch)) = &expr_if.else_branch {
                    self.eval(else_branch)
                } else {
                    Ok(Value::Unit)
                }
            }
            Expr::While(expr_while) => {
                if expr_while.label.is_some() {
                    return Err(Exception::unsupported("labeled loop").into());
                }
                while self.eval_condition(&expr_while.cond)? {
                    match self.exec_block(&expr_while.body) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break(_)) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }
            Expr::Loop(expr_loop) => {
                if expr_loop.label.is_some() {
                    return Err(Exception::unsupported("labeled loop").into());
                }
                loop {
                    match self.exec_block(&expr_loop.body) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break(value)) => return Ok(value.unwrap_or(Value::Unit)),
                        Err(other) => return Err(other),
                    }
                }
            }
            Expr::ForLoop(for_loop) => {
                if for_loop.label.is_some() {
                    return Err(Exception::unsupported("labeled loop").into());
                }
                let iterable = self.eval(&for_loop.expr)?;
                let iter = make_iter(&iterable)?;
                while let Some(item) = iter.advance() {
                    self.bind_pattern(&for_loop.pat, item)?;
                    match self.exec_block(&for_loop.body) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break(_)) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }
            Expr::Break(expr_break) => {
                if expr_break.label.is_some() {
                    return Err(Exception::unsupported("labeled break").into());
                }
                let value = match &expr_break.expr {
                    Some(expr) => Some(self.eval(expr)?),
                    None => None,
                };
                Err(Unwind::Break(value))
            }
            Expr::Continue(expr_continue) => {
                if expr_continue.label.is_some() {
                    return Err(Exception::unsupported("labeled continue").into());
                }
                Err(Unwind::Continue)
            }
            Expr::Return(expr_return) => {
                let value = match &expr_return.expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                Err(Unwind::Return(value))
            }
            Expr::Call(call) => {
                let args = self.eval_all(call.args.iter())?;
                self.eval_call(&call.func, args)
            }
            Expr::MethodCall(call) => {
                let receiver = self.eval(&call.receiver)?;
                let args = self.eval_all(call.args.iter())?;
                Ok(methods::call_method(&receiver, &call.method.to_string(), args)?)
            }
            Expr::Macro(mac) => self.eval_macro(&mac.mac),
            Expr::Index(index) => {
                let container = self.eval(&index.expr)?;
                let position = self.eval(&index.index)?;
                Ok(index_get(&container, &position)?)
            }
            Expr::Field(field) => {
                let base = self.eval(&field.base)?;
                match (&base, &field.member) {
                    (Value::Tuple(items), Member::Unnamed(index)) => {
                        items.get(index.index as usize).cloned().ok_or_else(|| {
                            Unwind::Raise(Exception::index_error(format!(
                                "no field {} on a tuple of {} elements",
                                index.index,
                                items.len()
                            )))
                        })
                    }
                    _ => Err(Exception::type_error(format!(
                        "no field `{}` on {}",
                        render(&field.member),
                        base.type_name()
                    ))
                    .into()),
                }
            }
            Expr::Tuple(tuple) => {
                if tuple.elems.is_empty() {
                    return Ok(Value::Unit);
                }
                let items = self.eval_all(tuple.elems.iter())?;
                Ok(Value::tuple(items))
            }
            Expr::Array(array) => {
                let items = self.eval_all(array.elems.iter())?;
                Ok(Value::list(items))
            }
            Expr::Repeat(repeat) => {
                let item = self.eval(&repeat.expr)?;
                let count = self.eval(&repeat.len)?;
                Ok(repeat_list(item, &count)?)
            }
            Expr::Range(range) => {
                let (Some(start), Some(end)) = (&range.start, &range.end) else {
                    return Err(Exception::unsupported("open-ended range").into());
                };
                let start = self.eval(start)?;
                let end = self.eval(end)?;
                match (start, end) {
                    (Value::Int(start), Value::Int(end)) => Ok(Value::Range(RangeValue {
                        start,
                        end,
                        inclusive: matches!(range.limits, RangeLimits::Closed(_)),
                    })),
                    (start, end) => Err(Exception::type_error(format!(
                        "range bounds must be int, found {} and {}",
                        start.type_name(),
                        end.type_name()
                    ))
                    .into()),
                }
            }
            Expr::Cast(cast) => {
                let value = self.eval(&cast.expr)?;
                Ok(ops::cast(value, &render(&cast.ty))?)
            }
            other => Err(Exception::unsupported(format!("expression `{}`", render(other))).into()),
        }
    }

    fn eval_all<'a>(&mut self, exprs: impl Iterator<Item = &'a Expr>) -> Flow<Vec<Value>> {
        exprs.map(|expr| self.eval(expr)).collect()
    }

    fn eval_condition(&mut self, cond: &Expr) -> Flow<bool> {
        if let Expr::Let(_) = cond {
            return Err(Exception::unsupported("`if let` / `while let`").into());
        }
        match self.eval(cond)? {
            Value::Bool(b) => Ok(b),
            other => Err(Exception::type_error(format!(
                "expected bool condition, found {}",
                other.type_name()
            ))
            .into()),
        }
    }

    fn eval_path(&mut self, path: &syn::ExprPath) -> Flow<Value> {
        let Some(ident) = path.path.get_ident() else {
            return Err(Exception::unsupported(format!("path `{}`", render(path))).into());
        };
        let name = ident.to_string();
        if let Some(value) = self.lookup_local(&name) {
            return Ok(value);
        }
        if let Some(code) = self.program.resolve(&name) {
            return Ok(Value::Function(FunctionRef {
                code,
                name: Rc::from(name.as_str()),
            }));
        }
        Err(Exception::name_error(&name).into())
    }

    fn eval_call(&mut self, func: &Expr, args: Vec<Value>) -> Flow<Value> {
        if let Expr::Path(path) = func {
            let segments: Vec<String> = path
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect();
            match segments.as_slice() {
                [name] => {
                    if let Some(value) = self.lookup_local(name) {
                        return self.call_value(&value, args);
                    }
                    if let Some(code) = self.program.resolve(name) {
                        return self.call_function(code, args);
                    }
                    if let Some(result) = self.call_native(name, args) {
                        return result;
                    }
                    return Err(Exception::name_error(name).into());
                }
                [ty, ctor] => return Ok(construct(ty, ctor, args)?),
                _ => {}
            }
        }
        let callee = self.eval(func)?;
        self.call_value(&callee, args)
    }

    fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Flow<Value> {
        match callee {
            Value::Function(func) => self.call_function(func.code, args),
            other => Err(Exception::type_error(format!("{} is not callable", other.type_name())).into()),
        }
    }

    fn eval_binary(&mut self, binary: &syn::ExprBinary) -> Flow<Value> {
        match &binary.op {
            BinOp::And(_) => {
                if !self.eval_condition(&binary.left)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval_condition(&binary.right)?))
            }
            BinOp::Or(_) => {
                if self.eval_condition(&binary.left)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_condition(&binary.right)?))
            }
            op => {
                if let Some(arith) = Arith::compound(op) {
                    let current = self.eval(&binary.left)?;
                    let rhs = self.eval(&binary.right)?;
                    let updated = ops::arith(arith, current, rhs)?;
                    self.assign_to(&binary.left, updated)?;
                    return Ok(Value::Unit);
                }
                let lhs = self.eval(&binary.left)?;
                let rhs = self.eval(&binary.right)?;
                Ok(ops::binary(op, lhs, rhs)?)
            }
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> Flow<()> {
        match target {
            Expr::Path(path) => match path.path.get_ident() {
                Some(ident) => {
                    self.set_local(&ident.to_string(), value)?;
                    Ok(())
                }
                None => Err(Exception::unsupported(format!("assignment to `{}`", render(path))).into()),
            },
            Expr::Paren(paren) => self.assign_to(&paren.expr, value),
            Expr::Unary(unary) if matches!(unary.op, UnOp::Deref(_)) => self.assign_to(&unary.expr, value),
            Expr::Index(index) => {
                let container = self.eval(&index.expr)?;
                let position = self.eval(&index.index)?;
                Ok(index_set(&container, &position, value)?)
            }
            other => Err(Exception::unsupported(format!("assignment to `{}`", render(other))).into()),
        }
    }
}

fn eval_lit(lit: &Lit) -> Result<Value, Exception> {
    match lit {
        Lit::Int(int) => int
            .base10_parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Exception::new("OverflowError", format!("integer literal {} out of range", int))),
        Lit::Float(float) => float
            .base10_parse::<f64>()
            .map(Value::Float)
            .map_err(|e| Exception::type_error(e.to_string())),
        Lit::Str(s) => Ok(Value::str(s.value())),
        Lit::Char(c) => Ok(Value::str(c.value().to_string())),
        Lit::Bool(b) => Ok(Value::Bool(b.value)),
        other => Err(Exception::unsupported(format!("literal `{}`", render(other)))),
    }
}

fn eval_unary(op: &UnOp, value: Value) -> Result<Value, Exception> {
    match (op, value) {
        (UnOp::Deref(_), value) => Ok(value),
        (UnOp::Neg(_), Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Exception::new("OverflowError", "attempt to negate with overflow")),
        (UnOp::Neg(_), Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not(_), Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Not(_), Value::Int(n)) => Ok(Value::Int(!n)),
        (op, value) => Err(Exception::type_error(format!(
            "cannot apply unary `{}` to {}",
            render(op),
            value.type_name()
        ))),
    }
}

/// Build an iterator over an iterable value.
pub(super) fn make_iter(value: &Value) -> Result<Rc<IterObject>, Exception> {
    match value {
        Value::Iter(iter) => Ok(Rc::clone(iter)),
        Value::Range(range) => Ok(Rc::new(IterObject::new(IterState::Range {
            next: range.start,
            end: range.end_exclusive(),
        }))),
        Value::List(list) => Ok(Rc::new(IterObject::new(IterState::List {
            list: Rc::clone(list),
            index: 0,
        }))),
        other => Err(Exception::type_error(format!("{} is not iterable", other.type_name()))),
    }
}

fn list_index(len: usize, position: &Value) -> Result<usize, Exception> {
    let Value::Int(n) = position else {
        return Err(Exception::type_error(format!(
            "list indices must be int, not {}",
            position.type_name()
        )));
    };
    usize::try_from(*n)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| {
            Exception::index_error(format!(
                "index out of bounds: the len is {} but the index is {}",
                len, n
            ))
        })
}

fn index_get(container: &Value, position: &Value) -> Result<Value, Exception> {
    match container {
        Value::List(list) => {
            let items = list.items();
            let index = list_index(items.len(), position)?;
            Ok(items[index].clone())
        }
        other => Err(Exception::type_error(format!("{} is not indexable", other.type_name()))),
    }
}

fn index_set(container: &Value, position: &Value, value: Value) -> Result<(), Exception> {
    match container {
        Value::List(list) => {
            let mut items = list.items_mut();
            let index = list_index(items.len(), position)?;
            items[index] = value;
            Ok(())
        }
        other => Err(Exception::type_error(format!(
            "{} does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `[item; count]` and `vec![item; count]`.
pub(super) fn repeat_list(item: Value, count: &Value) -> Result<Value, Exception> {
    let Value::Int(n) = count else {
        return Err(Exception::type_error("repeat count must be int"));
    };
    let n = usize::try_from(*n).map_err(|_| Exception::new("ValueError", "negative repeat count"))?;
    let mut items = Vec::new();
    items.try_reserve_exact(n).map_err(|e| {
        Exception::new("MemoryError", format!("cannot allocate a list of {} items: {}", n, e))
    })?;
    items.resize(n, item);
    Ok(Value::list(items))
}

/// `Type::ctor(..)` calls for the few std constructors scripts use.
fn construct(ty: &str, ctor: &str, args: Vec<Value>) -> Result<Value, Exception> {
    match (ty, ctor, args.as_slice()) {
        ("Vec", "new", []) | ("Vec", "with_capacity", [Value::Int(_)]) => Ok(Value::list(Vec::new())),
        ("String", "new", []) => Ok(Value::str("")),
        ("String", "from", [Value::Str(s)]) => Ok(Value::Str(Rc::clone(s))),
        _ => Err(Exception::unsupported(format!("constructor {}::{}", ty, ctor))),
    }
}
