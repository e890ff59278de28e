//! Macro invocations.
//!
//! | macro                        | effect                                       |
//! |------------------------------|----------------------------------------------|
//! | `vec![a, b]`, `vec![x; n]`   | new list                                     |
//! | `format!(..)`                | formatted `str`                              |
//! | `print!`, `println!`         | append to the interpreter output buffer      |
//! | `panic!(..)`                 | raise `Panic`                                |
//! | `throw!(Kind, ..)`           | raise `Kind` with a formatted message        |
//! | `assert!`, `assert_eq!`, `assert_ne!` | raise `AssertionError` on failure   |

use syn::parse::{ParseStream, Parser};
use syn::punctuated::Punctuated;
use syn::{Expr, Lit, Macro, Token};

use super::eval::{render, repeat_list};
use super::{Flow, Interpreter};
use crate::exception::Exception;
use crate::value::Value;

enum VecBody {
    Items(Vec<Expr>),
    Repeat(Expr, Expr),
}

fn parse_vec_body(input: ParseStream<'_>) -> syn::Result<VecBody> {
    if input.is_empty() {
        return Ok(VecBody::Items(Vec::new()));
    }
    let first: Expr = input.parse()?;
    if input.peek(Token![;]) {
        input.parse::<Token![;]>()?;
        let count: Expr = input.parse()?;
        return Ok(VecBody::Repeat(first, count));
    }
    let mut items = vec![first];
    while !input.is_empty() {
        input.parse::<Token![,]>()?;
        if input.is_empty() {
            break;
        }
        items.push(input.parse()?);
    }
    Ok(VecBody::Items(items))
}

fn macro_args(mac: &Macro, name: &str) -> Result<Vec<Expr>, Exception> {
    Punctuated::<Expr, Token![,]>::parse_terminated
        .parse2(mac.tokens.clone())
        .map(|args| args.into_iter().collect())
        .map_err(|e| Exception::unsupported(format!("malformed {}! invocation: {}", name, e)))
}

impl Interpreter {
    pub(super) fn eval_macro(&mut self, mac: &Macro) -> Flow<Value> {
        let name = mac
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default();

        match name.as_str() {
            "vec" => {
                let body = parse_vec_body
                    .parse2(mac.tokens.clone())
                    .map_err(|e| Exception::unsupported(format!("malformed vec! invocation: {}", e)))?;
                match body {
                    VecBody::Items(items) => {
                        let values = items
                            .iter()
                            .map(|expr| self.eval(expr))
                            .collect::<Flow<Vec<_>>>()?;
                        Ok(Value::list(values))
                    }
                    VecBody::Repeat(item, count) => {
                        let item = self.eval(&item)?;
                        let count = self.eval(&count)?;
                        Ok(repeat_list(item, &count)?)
                    }
                }
            }
            "format" => {
                let args = macro_args(mac, &name)?;
                Ok(Value::str(self.format_args(&name, &args)?))
            }
            "print" | "println" | "eprint" | "eprintln" => {
                let args = macro_args(mac, &name)?;
                let mut text = if args.is_empty() {
                    String::new()
                } else {
                    self.format_args(&name, &args)?
                };
                if name.ends_with("ln") {
                    text.push('\n');
                }
                self.write_output(&text);
                Ok(Value::Unit)
            }
            "panic" => {
                let args = macro_args(mac, &name)?;
                let message = if args.is_empty() {
                    "explicit panic".to_string()
                } else {
                    self.format_args(&name, &args)?
                };
                Err(Exception::new("Panic", message).into())
            }
            "throw" => {
                let args = macro_args(mac, &name)?;
                let Some(Expr::Path(kind)) = args.first() else {
                    return Err(Exception::unsupported("throw! expects an exception kind first").into());
                };
                let kind = render(kind).replace(' ', "");
                let message = if args.len() > 1 {
                    self.format_args(&name, &args[1..])?
                } else {
                    String::new()
                };
                Err(Exception::new(kind, message).into())
            }
            "assert" => {
                let args = macro_args(mac, &name)?;
                let Some(cond) = args.first() else {
                    return Err(Exception::unsupported("assert! requires a condition").into());
                };
                match self.eval(cond)? {
                    Value::Bool(true) => Ok(Value::Unit),
                    Value::Bool(false) => {
                        let message = if args.len() > 1 {
                            self.format_args(&name, &args[1..])?
                        } else {
                            format!("assertion failed: {}", render(cond))
                        };
                        Err(Exception::new("AssertionError", message).into())
                    }
                    other => Err(Exception::type_error(format!(
                        "assert! condition must be bool, found {}",
                        other.type_name()
                    ))
                    .into()),
                }
            }
            "assert_eq" | "assert_ne" => {
                let args = macro_args(mac, &name)?;
                if args.len() < 2 {
                    return Err(Exception::unsupported(format!("{}! requires two operands", name)).into());
                }
                let left = self.eval(&args[0])?;
                let right = self.eval(&args[1])?;
                let expect_equal = name == "assert_eq";
                if (left == right) == expect_equal {
                    return Ok(Value::Unit);
                }
                let op = if expect_equal { "==" } else { "!=" };
                let mut message = format!(
                    "assertion `left {} right` failed\n  left: {:?}\n right: {:?}",
                    op, left, right
                );
                if args.len() > 2 {
                    message = format!("{}: {}", self.format_args(&name, &args[2..])?, message);
                }
                Err(Exception::new("AssertionError", message).into())
            }
            other => Err(Exception::unsupported(format!("macro `{}!`", other)).into()),
        }
    }

    /// Render `"template", args..` the way `format!` does.
    fn format_args(&mut self, name: &str, args: &[Expr]) -> Flow<String> {
        let Some(Expr::Lit(template)) = args.first() else {
            return Err(Exception::unsupported(format!("{}! expects a string literal", name)).into());
        };
        let Lit::Str(template) = &template.lit else {
            return Err(Exception::unsupported(format!("{}! expects a string literal", name)).into());
        };
        let values = args[1..]
            .iter()
            .map(|expr| self.eval(expr))
            .collect::<Flow<Vec<_>>>()?;
        Ok(render_template(&template.value(), &values, |ident| self.lookup_local(ident))?)
    }
}

/// Expand `{}`, `{:?}`, `{0}`, `{name}`, `{:.N}` and `{{`/`}}` escapes.
fn render_template(
    template: &str,
    values: &[Value],
    lookup: impl Fn(&str) -> Option<Value>,
) -> Result<String, Exception> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_positional = 0;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return Err(Exception::unsupported("unterminated `{` in format string")),
                    }
                }
                let (arg, format) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let value = if arg.is_empty() {
                    let value = values.get(next_positional).cloned();
                    next_positional += 1;
                    value
                } else if let Ok(index) = arg.parse::<usize>() {
                    values.get(index).cloned()
                } else {
                    Some(lookup(arg).ok_or_else(|| Exception::name_error(arg))?)
                };
                let value = value.ok_or_else(|| {
                    Exception::type_error("format string references a missing argument")
                })?;
                out.push_str(&format_value(&value, format)?);
            }
            '}' => return Err(Exception::unsupported("unmatched `}` in format string")),
            c => out.push(c),
        }
    }

    Ok(out)
}

fn format_value(value: &Value, format: &str) -> Result<String, Exception> {
    match format {
        "" => Ok(value.to_string()),
        "?" | "#?" => Ok(format!("{:?}", value)),
        other => {
            let precision = other
                .strip_prefix('.')
                .and_then(|p| p.parse::<usize>().ok())
                .ok_or_else(|| Exception::unsupported(format!("format `{{:{}}}`", other)))?;
            match value {
                Value::Float(x) => Ok(format!("{:.*}", precision, x)),
                Value::Int(n) => Ok(format!("{:.*}", precision, *n as f64)),
                value => Ok(value.to_string()),
            }
        }
    }
}
