//! Scenario configuration for the dispatch inspector.
//!
//! A scenario file describes a manager configuration, the listeners and
//! subscribers to register, the events to disable, and the fires to replay.
//! Listener and subscriber entries use the same shapes the dispatcher accepts
//! from dynamic data: a handle string, a `[call, method, args]` sequence or a
//! `{call, method, args}` table.

use event_dispatch::ManagerConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

fn default_level() -> String {
    "info".to_string()
}

/// Complete scenario loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Events disabled before any fire
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_events: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribers: Vec<Value>,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<ListenerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fires: Vec<FireSpec>,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
        }
    }
}

/// One listener registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub event: String,
    /// Falls back to `manager.default_priority`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Listener declaration, see the module docs for accepted shapes
    pub listener: Value,
}

/// One replayed fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireSpec {
    /// Event name; anything but a string is rejected when fired
    pub event: Value,
    /// Parameters as a table (named) or an array (positional)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl InspectorConfig {
    /// Scenario written when no file exists yet, exercising every built-in handle.
    pub fn demo() -> Self {
        Self {
            logging: LoggingSettings::default(),
            manager: ManagerConfig::default(),
            disabled_events: vec!["user.deleted".to_string()],
            listeners: vec![
                ListenerSpec {
                    event: "user".to_string(),
                    priority: Some(event_dispatch::PRIORITY_LOW),
                    listener: json!("Audit"),
                },
                ListenerSpec {
                    event: "user.login".to_string(),
                    priority: Some(event_dispatch::PRIORITY_HIGH),
                    listener: json!({"call": "SetParam", "args": ["greeting", "welcome back"]}),
                },
                ListenerSpec {
                    event: "user.logout".to_string(),
                    priority: Some(event_dispatch::PRIORITY_VERY_HIGH),
                    listener: json!(["Halt"]),
                },
            ],
            subscribers: vec![json!("SessionTracker")],
            fires: vec![
                FireSpec {
                    event: json!("user.login"),
                    params: json!({"name": "ada"}),
                },
                FireSpec {
                    event: json!("user.logout"),
                    params: json!({"name": "ada"}),
                },
                FireSpec {
                    event: json!("user.deleted"),
                    params: Value::Null,
                },
            ],
        }
    }

    /// Loads a scenario from a TOML file.
    ///
    /// If the file doesn't exist, the demo scenario is written to `path` and
    /// returned.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: InspectorConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let demo = InspectorConfig::demo();
            let toml_content = toml::to_string_pretty(&demo)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created demo scenario file: {}", path.display());
            Ok(demo)
        }
    }

    /// Validates the scenario.
    ///
    /// Declaration shapes are checked by the dispatcher when the scenario is
    /// registered; this only covers what it cannot see.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        self.manager.validate().map_err(|e| e.to_string())?;

        if let Some(index) = self.listeners.iter().position(|spec| spec.event.is_empty()) {
            return Err(format!("Listener #{index} has an empty event name"));
        }

        if self.disabled_events.iter().any(String::is_empty) {
            return Err("Disabled event names cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::fs;

    #[test]
    fn test_demo_is_valid() {
        let config = InspectorConfig::demo();
        assert!(config.validate().is_ok());
        assert_eq!(config.listeners.len(), 3);
        assert_eq!(config.fires.len(), 3);
    }

    #[test]
    fn test_demo_round_trips_through_toml() {
        let demo = InspectorConfig::demo();
        let content = toml::to_string_pretty(&demo).unwrap();
        let parsed: InspectorConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.listeners, demo.listeners);
        assert_eq!(parsed.fires, demo.fires);
        assert_eq!(parsed.subscribers, demo.subscribers);
        assert_eq!(parsed.manager, demo.manager);
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.toml");

        let config = InspectorConfig::load_from_file(&path).await.unwrap();

        assert_eq!(config.listeners, InspectorConfig::demo().listeners);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
disabled_events = ["audit.skip"]
subscribers = ["SessionTracker", { call = "SessionTracker", args = ["strict"] }]

[logging]
level = "debug"
json_format = true

[manager]
default_priority = 20
log_enabled = true

[[listeners]]
event = "order"
listener = "Audit"

[[listeners]]
event = "order.paid"
listener = ["SetParam", "handle", ["paid", true]]
priority = 90

[[fires]]
event = "order.paid"
params = { id = 7, amount = 12, currency = "EUR" }

[[fires]]
event = "order.created"
params = ["first", "second"]
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = InspectorConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.manager.default_priority, 20);
        assert!(config.manager.log_enabled);
        assert!(config.manager.cache_listener_instances);
        assert_eq!(config.disabled_events, vec!["audit.skip"]);
        assert_eq!(config.subscribers[1], json!({"call": "SessionTracker", "args": ["strict"]}));

        assert_eq!(config.listeners[0].priority, None);
        assert_eq!(config.listeners[1].listener, json!(["SetParam", "handle", ["paid", true]]));
        assert_eq!(config.listeners[1].priority, Some(90));

        let keys: Vec<&str> = config.fires[0]
            .params
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["id", "amount", "currency"]);
        assert_eq!(config.fires[0].params["amount"], json!(12));
        assert_eq!(config.fires[1].params, json!(["first", "second"]));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[[listeners]]\nevent = 3\n").await.unwrap();

        assert!(InspectorConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = InspectorConfig::default();
        config.logging.level = "loud".to_string();

        let result = config.validate();
        assert!(result.unwrap_err().contains("Invalid log level"));
    }

    #[test]
    fn test_validation_invalid_manager() {
        let mut config = InspectorConfig::default();
        config.manager.default_priority = 50_000;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_names() {
        let mut config = InspectorConfig::demo();
        config.listeners[1].event.clear();
        assert!(config.validate().unwrap_err().contains("#1"));

        let mut config = InspectorConfig::default();
        config.disabled_events.push(String::new());
        assert!(config.validate().is_err());
    }
}
