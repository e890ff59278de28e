//! Call arguments.

use indexmap::IndexMap;

use crate::value::Value;

/// Positional and named arguments for a call.
///
/// # Example
///
/// ```
/// use troy_runtime::{CallArgs, Value};
///
/// let args = CallArgs::new().arg(1).arg("text").named("limit", 10);
/// assert_eq!(args.positional().len(), 2);
/// assert_eq!(args.named_args().get("limit"), Some(&Value::Int(10)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: IndexMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments from a list of positional values.
    pub fn positional_values(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: IndexMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a named argument, bound to the parameter of the same name.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_args(&self) -> &IndexMap<String, Value> {
        &self.named
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, IndexMap<String, Value>) {
        (self.positional, self.named)
    }
}
