//! Runtime configuration.

use serde::Deserialize;

/// Configuration for an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of nested script activations before `RecursionError`.
    pub max_call_depth: usize,

    /// Whether trace hooks may be installed at all.
    ///
    /// Embedders that must never be observed turn this off; instrumentation
    /// requests then fail with `RuntimeError::HooksDisabled`.
    pub allow_trace_hooks: bool,

    /// Register the built-in natives (`open`, `len`).
    pub builtins: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            allow_trace_hooks: true,
            builtins: true,
        }
    }
}

impl RuntimeConfig {
    /// Config with trace hooks switched off.
    pub fn without_hooks() -> Self {
        Self {
            allow_trace_hooks: false,
            ..Self::default()
        }
    }

    /// Override the maximum call depth.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_call_depth, 128);
        assert!(config.allow_trace_hooks);
        assert!(config.builtins);
    }

    #[test]
    fn test_without_hooks() {
        let config = RuntimeConfig::without_hooks().with_max_call_depth(8);
        assert!(!config.allow_trace_hooks);
        assert_eq!(config.max_call_depth, 8);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"max_call_depth": 16}"#).unwrap();
        assert_eq!(config.max_call_depth, 16);
        assert!(config.allow_trace_hooks);
    }
}
