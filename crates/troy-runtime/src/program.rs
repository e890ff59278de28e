//! Program loading using syn.
//!
//! A program is a set of top-level `fn` items written in Rust syntax. Types
//! in signatures are accepted and ignored; bodies are interpreted directly
//! from the syn AST.

use rustc_hash::FxHashMap;
use syn::spanned::Spanned;
use syn::{File, FnArg, Item, ItemFn, Pat};

use crate::error::{Result, RuntimeError};
use crate::value::CodeId;

/// A loaded script function.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    code: CodeId,
    name: String,
    params: Vec<String>,
    body: syn::Block,
    line: usize,
}

impl FunctionDef {
    pub fn code(&self) -> CodeId {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Line of the `fn` keyword in the program source.
    pub fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn body(&self) -> &syn::Block {
        &self.body
    }
}

/// A parsed program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    functions: Vec<FunctionDef>,
    by_name: FxHashMap<String, CodeId>,
}

impl Program {
    /// Parse program source.
    pub fn parse(source: &str) -> Result<Self> {
        let file: File = syn::parse_str(source).map_err(|e| {
            let start = e.span().start();
            RuntimeError::Parse(format!("{}:{}: {}", start.line, start.column, e))
        })?;

        let mut program = Program::default();
        for item in &file.items {
            match item {
                Item::Fn(func) => program.add_function(func)?,
                Item::Use(_) => {}
                other => return Err(RuntimeError::UnsupportedItem(describe_item(other))),
            }
        }

        tracing::debug!("Loaded program with {} functions", program.functions.len());
        Ok(program)
    }

    fn add_function(&mut self, func: &ItemFn) -> Result<()> {
        let name = func.sig.ident.to_string();
        if self.by_name.contains_key(&name) {
            return Err(RuntimeError::DuplicateFunction(name));
        }

        let params = func
            .sig
            .inputs
            .iter()
            .map(|arg| Self::param_name(&name, arg))
            .collect::<Result<Vec<_>>>()?;

        let code = CodeId(self.functions.len());
        self.functions.push(FunctionDef {
            code,
            name: name.clone(),
            params,
            body: (*func.block).clone(),
            line: func.sig.fn_token.span().start().line,
        });
        self.by_name.insert(name, code);
        Ok(())
    }

    fn param_name(function: &str, arg: &FnArg) -> Result<String> {
        match arg {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(ident) if ident.subpat.is_none() => Ok(ident.ident.to_string()),
                other => Err(RuntimeError::UnsupportedItem(format!(
                    "parameter pattern `{}` in fn {}",
                    quote::quote!(#other),
                    function
                ))),
            },
            FnArg::Receiver(_) => Err(RuntimeError::UnsupportedItem(format!(
                "self parameter in fn {}",
                function
            ))),
        }
    }

    /// Look up a function by code identity.
    pub fn function(&self, code: CodeId) -> Option<&FunctionDef> {
        self.functions.get(code.0)
    }

    /// Resolve a function name to its code identity.
    pub fn resolve(&self, name: &str) -> Option<CodeId> {
        self.by_name.get(name).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn describe_item(item: &Item) -> String {
    match item {
        Item::Struct(s) => format!("struct {}", s.ident),
        Item::Enum(e) => format!("enum {}", e.ident),
        Item::Impl(_) => "impl block".to_string(),
        Item::Trait(t) => format!("trait {}", t.ident),
        Item::Mod(m) => format!("mod {}", m.ident),
        Item::Const(c) => format!("const {}", c.ident),
        Item::Static(s) => format!("static {}", s.ident),
        other => {
            let rendered = quote::quote!(#other).to_string();
            rendered.chars().take(40).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_functions() {
        let program = Program::parse(
            r#"
use std::fmt;

fn add(a: i64, b: i64) -> i64 {
    a + b
}

fn main() {
    add(1, 2);
}
"#,
        )
        .unwrap();

        assert_eq!(program.len(), 2);
        let add = program.function(program.resolve("add").unwrap()).unwrap();
        assert_eq!(add.params(), ["a".to_string(), "b".to_string()]);
        assert_eq!(add.line(), 4);
        assert!(program.resolve("missing").is_none());
    }

    #[test]
    fn test_duplicate_function() {
        let err = Program::parse("fn f() {} fn f() {}").unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateFunction(name) if name == "f"));
    }

    #[test]
    fn test_unsupported_item() {
        let err = Program::parse("struct Point { x: i64 }").unwrap_err();
        assert!(matches!(err, RuntimeError::UnsupportedItem(msg) if msg == "struct Point"));
    }

    #[test]
    fn test_unsupported_param_pattern() {
        let err = Program::parse("fn f((a, b): (i64, i64)) {}").unwrap_err();
        assert!(matches!(err, RuntimeError::UnsupportedItem(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = Program::parse("fn f( {").unwrap_err();
        assert!(matches!(err, RuntimeError::Parse(_)));
    }
}
