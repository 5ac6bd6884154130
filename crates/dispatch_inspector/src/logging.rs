//! Diagnostic output for the inspector.
//!
//! The replay report is the only thing written to stdout, so it can be piped
//! into `jq` or a file. Dispatcher and inspector diagnostics go to stderr,
//! either as plain lines or as one JSON object per line.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber for the run.
///
/// `RUST_LOG` wins over the scenario's level. JSON output is used when either
/// the `--json-logs` flag (`force_json`) or the scenario asks for it.
pub fn setup_logging(
    settings: &LoggingSettings,
    force_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let diagnostics = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    if force_json || settings.json_format {
        registry.with(diagnostics.json().with_current_span(false)).try_init()?;
    } else {
        registry.with(diagnostics.with_target(false)).try_init()?;
    }

    info!("🔧 Dispatch diagnostics at level {} on stderr", settings.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let settings = LoggingSettings::default();
        // whichever call runs first in this process installs the subscriber
        let _ = setup_logging(&settings, false);
        assert!(setup_logging(&settings, true).is_err());
    }
}
