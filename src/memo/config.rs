//! Memoization configuration.
//!
//! Read from the `[memo]` section of `memento.toml` (see `crate::config`).
//!
//! ```toml
//! [memo]
//! enabled = true
//! record_metrics = true
//! ```

use serde::Deserialize;

/// Runtime switches for every table built with this configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    /// When false, decorators call straight through to the wrapped body.
    pub enabled: bool,
    /// Emit hit/miss/reset counters through the `metrics` facade.
    pub record_metrics: bool,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            record_metrics: true,
        }
    }
}

impl MemoConfig {
    /// A configuration that bypasses every cache.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = MemoConfig::default();
        assert!(config.enabled);
        assert!(config.record_metrics);
    }

    #[test]
    fn disabled_keeps_metrics_default() {
        let config = MemoConfig::disabled();
        assert!(!config.enabled);
        assert!(config.record_metrics);
    }
}
