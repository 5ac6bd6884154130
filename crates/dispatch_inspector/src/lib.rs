//! # Dispatch Inspector
//!
//! Replays an event scenario through the dispatcher and reports which
//! listeners ran, in what order, and with what effect on each event.
//!
//! ## Quick Start
//!
//! ```bash
//! # Replay scenario.toml (written with a demo scenario if missing)
//! dispatch-inspector
//!
//! # Custom scenario with the timed dispatch log, as JSON
//! dispatch-inspector --config checkout.toml --dispatch-log --format json
//!
//! # Verbose dispatcher logs on stderr
//! dispatch-inspector --log-level debug
//! ```
//!
//! ## Scenario
//!
//! Scenarios are TOML files. Listeners refer to the built-in handles of
//! [`builtins`] by name, subscribers likewise. See [`config`] for the layout.

use tracing::error;

pub mod app;
pub mod builtins;
pub mod cli;
pub mod config;
pub mod logging;

use app::Application;
use cli::CliArgs;
use config::InspectorConfig;

/// Runs the inspector: parse arguments, set up logging, replay, report.
///
/// Called from the async `main`; startup and replay failures exit with code 1.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the scenario, so read it once up front
    let mut settings = InspectorConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        settings.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run() {
                error!("❌ Replay failed: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::{build_manager, FireOutcome, Report};
pub use config::{FireSpec, ListenerSpec, LoggingSettings};
