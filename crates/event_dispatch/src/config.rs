//! Manager configuration

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};

pub const PRIORITY_VERY_LOW: i32 = 10;
pub const PRIORITY_LOW: i32 = 30;
pub const PRIORITY_MEDIUM: i32 = 50;
pub const PRIORITY_HIGH: i32 = 70;
pub const PRIORITY_VERY_HIGH: i32 = 90;

fn default_priority() -> i32 {
    PRIORITY_MEDIUM
}

fn default_cache_listener_instances() -> bool {
    true
}

/// Settings of an [`EventManager`](crate::EventManager).
///
/// Every field has a default, so a partial `[manager]` table deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Priority given to listeners registered without one
    #[serde(default = "default_priority")]
    pub default_priority: i32,
    /// Start with the dispatch log active
    #[serde(default)]
    pub log_enabled: bool,
    /// Keep one instance per handle and constructor args instead of
    /// constructing a listener for every invocation
    #[serde(default = "default_cache_listener_instances")]
    pub cache_listener_instances: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            log_enabled: false,
            cache_listener_instances: default_cache_listener_instances(),
        }
    }
}

impl ManagerConfig {
    /// Rejects a default priority outside `[-1000, 1000]`.
    pub fn validate(&self) -> Result<()> {
        const BOUND: i32 = 1_000;
        if !(-BOUND..=BOUND).contains(&self.default_priority) {
            return Err(DispatchError::invalid(format!(
                "default_priority {} out of range [-{BOUND}, {BOUND}]",
                self.default_priority
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.default_priority, PRIORITY_MEDIUM);
        assert!(!config.log_enabled);
        assert!(config.cache_listener_instances);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization() {
        let config: ManagerConfig = serde_json::from_str(r#"{"log_enabled": true}"#).unwrap();
        assert!(config.log_enabled);
        assert_eq!(config.default_priority, PRIORITY_MEDIUM);
        assert!(config.cache_listener_instances);
    }

    #[test]
    fn test_validate_rejects_out_of_range_priority() {
        let config = ManagerConfig {
            default_priority: 5_000,
            ..ManagerConfig::default()
        };
        assert!(config.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_priority_scale_is_ordered() {
        let scale = [
            PRIORITY_VERY_LOW,
            PRIORITY_LOW,
            PRIORITY_MEDIUM,
            PRIORITY_HIGH,
            PRIORITY_VERY_HIGH,
        ];
        assert!(scale.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
