//! Playground configuration.

use serde::{Deserialize, Serialize};

/// Which activations of the target a session snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Only the outermost activation (the invocation itself).
    #[default]
    Outermost,
    /// The outermost activation, plus one snapshot per nested (recursive)
    /// activation of the target code as it completes.
    AllActivations,
}

/// Configuration for a playground run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Activations to snapshot.
    pub capture_mode: CaptureMode,
}

impl PlaygroundConfig {
    /// Config that also snapshots every nested activation of the target.
    pub fn all_activations() -> Self {
        Self {
            capture_mode: CaptureMode::AllActivations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_outermost() {
        assert_eq!(PlaygroundConfig::default().capture_mode, CaptureMode::Outermost);
    }

    #[test]
    fn test_deserialize_mode() {
        let config: PlaygroundConfig =
            serde_json::from_str(r#"{"capture_mode": "all_activations"}"#).unwrap();
        assert_eq!(config.capture_mode, CaptureMode::AllActivations);

        let config: PlaygroundConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.capture_mode, CaptureMode::Outermost);
    }
}
