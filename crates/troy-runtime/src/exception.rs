//! Script exceptions.

use std::fmt;

use serde::Serialize;

/// One frame an exception unwound through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TracebackEntry {
    pub function: String,
    pub line: usize,
}

/// An exception raised by script code or a native function.
///
/// The `kind` plays the role of an exception class (`ValueError`,
/// `ZeroDivisionError`, ...). `cause` links to the exception this one was
/// raised from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exception {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<Box<Exception>>,
    traceback: Vec<TracebackEntry>,
}

impl Exception {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
            traceback: Vec::new(),
        }
    }

    /// Chain `cause` as the exception this one was raised from.
    pub fn with_cause(mut self, cause: Exception) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Exception> {
        self.cause.as_deref()
    }

    /// Frames unwound so far, innermost first.
    pub fn traceback(&self) -> &[TracebackEntry] {
        &self.traceback
    }

    pub(crate) fn push_frame(&mut self, function: &str, line: usize) {
        self.traceback.push(TracebackEntry {
            function: function.to_string(),
            line,
        });
    }

    pub(crate) fn name_error(name: &str) -> Self {
        Self::new("NameError", format!("name '{}' is not defined", name))
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::new("IndexError", message)
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::new("UnsupportedSyntax", message)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Exception::new("ValueError", "boom").to_string(), "ValueError: boom");
        assert_eq!(Exception::new("StopIteration", "").to_string(), "StopIteration");
    }

    #[test]
    fn test_cause_chain() {
        let exc = Exception::new("RuntimeError", "outer").with_cause(Exception::new("IoError", "inner"));
        assert_eq!(exc.cause().map(Exception::kind), Some("IoError"));
        assert!(std::error::Error::source(&exc).is_some());
    }
}
