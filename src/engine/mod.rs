//! Eviction engine: candidate selection, plan execution, run diagnostics.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod executor;
pub mod selector;

/// Which policy drives a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Age-based cleanup of uploads past their per-class retention window.
    Retention,
    /// Usage-driven cleanup that frees space until disk usage drops back to
    /// the pressure threshold.
    Pressure,
}

impl Mode {
    /// Stable lowercase label, used in fingerprint file names and payloads.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Retention => "retention",
            Self::Pressure => "pressure",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_labels_are_stable() {
        assert_eq!(Mode::Retention.label(), "retention");
        assert_eq!(Mode::Pressure.label(), "pressure");
        assert_eq!(Mode::Pressure.to_string(), "pressure");
    }

    #[test]
    fn mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Mode::Retention).unwrap(),
            "\"retention\""
        );
        let parsed: Mode = serde_json::from_str("\"pressure\"").unwrap();
        assert_eq!(parsed, Mode::Pressure);
    }
}
