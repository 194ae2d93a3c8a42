//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShieldError};

/// Handoff and timing parameters shared by the coordinator and page sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliveryConfig {
    /// How long a pending delivery stays valid.
    pub validity_window_ms: u64,
    /// Backup polls of the handoff slot after bootstrap.
    pub poll_attempts: u32,
    pub poll_interval_ms: u32,
    /// Key of the handoff slot (page `sessionStorage`).
    pub handoff_key: String,
    /// Event dispatched on `window` when a payload is ready.
    pub ready_event: String,
    /// Global flag marking a context as already spoofed.
    pub guard_flag: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            validity_window_ms: 10_000,
            poll_attempts: 10,
            poll_interval_ms: 50,
            handoff_key: "__fp_config__".to_string(),
            ready_event: "__fp_config_ready__".to_string(),
            guard_flag: "__fp_applied__".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShieldConfig {
    pub delivery: DeliveryConfig,
    /// `log` level name: error, warn, info, debug or trace.
    pub log_level: String,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ShieldConfig {
    /// Reject values that would disable the handoff entirely.
    pub fn validate(&self) -> Result<()> {
        let d = &self.delivery;
        if d.validity_window_ms == 0 {
            return Err(ShieldError::Config("validityWindowMs must be > 0".into()));
        }
        if d.handoff_key.is_empty() || d.ready_event.is_empty() || d.guard_flag.is_empty() {
            return Err(ShieldError::Config(
                "handoff key, ready event and guard flag must be non-empty".into(),
            ));
        }
        Ok(())
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }

    /// Parse a host-supplied JSON config, falling back to defaults when it
    /// is malformed or invalid.
    pub fn from_json_or_default(json: &str) -> Self {
        match serde_json::from_str::<ShieldConfig>(json) {
            Ok(config) if config.validate().is_ok() => config,
            Ok(_) | Err(_) => {
                log::warn!("Ignoring invalid configuration, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShieldConfig::default();
        assert_eq!(config.delivery.validity_window_ms, 10_000);
        assert_eq!(config.delivery.poll_attempts, 10);
        assert_eq!(config.delivery.poll_interval_ms, 50);
        assert_eq!(config.delivery.handoff_key, "__fp_config__");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = ShieldConfig::from_json_or_default(
            r#"{"delivery":{"pollAttempts":3},"logLevel":"debug"}"#,
        );
        assert_eq!(config.delivery.poll_attempts, 3);
        assert_eq!(config.delivery.poll_interval_ms, 50);
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_falls_back() {
        let config = ShieldConfig::from_json_or_default(r#"{"delivery":{"validityWindowMs":0}}"#);
        assert_eq!(config, ShieldConfig::default());
        let config = ShieldConfig::from_json_or_default("not json");
        assert_eq!(config, ShieldConfig::default());
    }

    #[test]
    fn test_unknown_level() {
        let config = ShieldConfig {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }
}
