//! Scenario replay and reporting.
//!
//! The `Application` loads a scenario, builds an [`EventManager`] from it,
//! replays every configured fire and renders what the dispatcher observed:
//! per-fire outcomes, listener summaries, fire counts and, when enabled, the
//! timed dispatch log.

use crate::builtins::register_builtins;
use crate::cli::{CliArgs, ReportFormat};
use crate::config::{FireSpec, InspectorConfig};
use event_dispatch::{
    DispatchError, EventLogEntry, EventManager, ListenerDeclaration, ListenerInfo,
    ListenerLogEntry, ParamKey, SubscriberDeclaration,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

/// What happened to one replayed fire
#[derive(Debug, Clone, Serialize)]
pub struct FireOutcome {
    pub event: String,
    /// Whether the event passed the enable gates
    pub enabled: bool,
    pub params: Vec<(ParamKey, Value)>,
    pub propagation_stopped: bool,
    /// Error that aborted the fire, if any
    pub error: Option<String>,
}

/// Everything the inspector reports after a replay
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub fires: Vec<FireOutcome>,
    pub listeners: Vec<ListenerInfo>,
    pub fire_counts: Vec<(String, u64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_log: Option<Vec<EventLogEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_log: Option<Vec<ListenerLogEntry>>,
}

pub struct Application {
    config: InspectorConfig,
    format: ReportFormat,
}

impl Application {
    /// Loads the scenario named by `args` and applies the CLI overrides.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading scenario from: {}", args.config_path.display());
        let mut config = InspectorConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if args.dispatch_log {
            config.manager.log_enabled = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Scenario validation failed: {e}").into());
        }

        info!(
            "✅ Scenario loaded: {} listener(s), {} subscriber(s), {} fire(s)",
            config.listeners.len(),
            config.subscribers.len(),
            config.fires.len()
        );

        Ok(Self::from_config(config, args.format))
    }

    pub fn from_config(config: InspectorConfig, format: ReportFormat) -> Self {
        Self { config, format }
    }

    /// Replays the scenario and renders the report to stdout.
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let report = self.replay()?;
        println!("{}", self.render(&report)?);
        Ok(())
    }

    /// Builds the manager and replays every fire.
    ///
    /// Invalid declarations abort the replay. A fire that fails is recorded in
    /// its outcome and the replay moves on to the next one.
    pub fn replay(&self) -> Result<Report, DispatchError> {
        let mut manager = build_manager(&self.config)?;
        let fires = self
            .config
            .fires
            .iter()
            .map(|spec| replay_fire(&mut manager, spec))
            .collect();

        Ok(Report {
            fires,
            listeners: manager.all_listeners_infos(),
            fire_counts: manager.fire_counts().snapshot(),
            event_log: manager.event_log().map(<[_]>::to_vec),
            listener_log: manager.listener_log().map(<[_]>::to_vec),
        })
    }

    pub fn render(&self, report: &Report) -> Result<String, serde_json::Error> {
        match self.format {
            ReportFormat::Json => serde_json::to_string_pretty(report),
            ReportFormat::Table => Ok(render_table(report)),
        }
    }
}

/// Creates a manager with the built-in handles and the scenario's
/// listeners, subscribers and disabled events.
pub fn build_manager(config: &InspectorConfig) -> Result<EventManager, DispatchError> {
    let mut manager = EventManager::with_config(config.manager.clone());
    register_builtins(&mut manager);

    for spec in &config.listeners {
        let declaration = ListenerDeclaration::from_value(spec.listener.clone())?;
        manager.add_listener(&spec.event, declaration, spec.priority)?;
    }

    for value in &config.subscribers {
        manager.add_subscriber(SubscriberDeclaration::from_value(value)?)?;
    }

    for name in &config.disabled_events {
        manager.disable_event(name.as_str());
    }

    debug!("📋 Scenario registered {} listener(s)", manager.total_listeners());
    Ok(manager)
}

fn replay_fire(manager: &mut EventManager, spec: &FireSpec) -> FireOutcome {
    let event = match &spec.event {
        Value::String(name) => name.clone(),
        other => other.to_string(),
    };
    let enabled = manager.is_event_enabled(&event);

    match manager.fire_value(&spec.event, &spec.params) {
        Ok(fired) => FireOutcome {
            event,
            enabled,
            params: fired.all_params().to_vec(),
            propagation_stopped: fired.is_propagation_stopped(),
            error: None,
        },
        Err(e) => {
            warn!("⚠️ Fire of {} failed: {}", event, e);
            FireOutcome {
                event,
                enabled,
                params: Vec::new(),
                propagation_stopped: false,
                error: Some(e.to_string()),
            }
        }
    }
}

fn render_params(params: &[(ParamKey, Value)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_table(report: &Report) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "FIRES");
    let _ = writeln!(out, "{:<24} {:<8} {:<8} PARAMS", "EVENT", "ENABLED", "STOPPED");
    for fire in &report.fires {
        match &fire.error {
            Some(error) => {
                let _ = writeln!(
                    out,
                    "{:<24} {:<8} {:<8} error: {}",
                    fire.event, fire.enabled, "-", error
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "{:<24} {:<8} {:<8} {}",
                    fire.event,
                    fire.enabled,
                    fire.propagation_stopped,
                    render_params(&fire.params)
                );
            }
        }
    }

    let _ = writeln!(out, "\nLISTENERS");
    let _ = writeln!(out, "{:<24} {:<36} {:>8} {:>6}", "EVENT", "CALL", "PRIORITY", "CALLS");
    for info in &report.listeners {
        let _ = writeln!(
            out,
            "{:<24} {:<36} {:>8} {:>6}",
            info.event, info.call, info.priority, info.invocation_count
        );
    }

    let _ = writeln!(out, "\nFIRE COUNTS");
    for (event, count) in &report.fire_counts {
        let _ = writeln!(out, "{event:<24} {count:>6}");
    }

    if let Some(entries) = &report.listener_log {
        let _ = writeln!(out, "\nDISPATCH LOG");
        for entry in entries {
            let _ = writeln!(
                out,
                "{:<24} {:<36} {:>8} {:>10}",
                entry.event,
                entry.call,
                entry.priority,
                format!("{:?}", entry.elapsed)
            );
        }
    }

    out
}
