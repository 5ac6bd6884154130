//! Command-line interface handling for the dispatch inspector.
//!
//! This module provides command-line argument parsing using the `clap` crate.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Default scenario file looked up in the working directory
pub const DEFAULT_SCENARIO_PATH: &str = "scenario.toml";

/// Output format of the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Aligned, human-readable tables
    #[default]
    Table,
    /// One pretty-printed JSON document
    Json,
}

impl ReportFormat {
    fn from_flag(value: &str) -> Self {
        match value {
            "json" => ReportFormat::Json,
            _ => ReportFormat::Table,
        }
    }
}

/// Command line arguments parsed from user input.
///
/// Options given here override the matching settings of the scenario file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the scenario file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to record the dispatch log regardless of the scenario setting
    pub dispatch_log: bool,
    pub format: ReportFormat,
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::parse_from(std::env::args_os())
    }

    /// Parses an explicit argument list; the first item is the binary name.
    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = command().get_matches_from(args);

        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_SCENARIO_PATH),
            ),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            dispatch_log: matches.get_flag("dispatch-log"),
            format: matches
                .get_one::<String>("format")
                .map(|value| ReportFormat::from_flag(value))
                .unwrap_or_default(),
        }
    }
}

fn command() -> Command {
    Command::new("Dispatch Inspector")
        .version(event_dispatch::DISPATCH_VERSION)
        .about("Replays an event scenario through the dispatcher and reports what ran")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Scenario file path")
                .default_value(DEFAULT_SCENARIO_PATH),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dispatch-log")
                .long("dispatch-log")
                .help("Record and report timed fire and listener entries")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Report format")
                .value_parser(["table", "json"])
                .default_value("table"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["dispatch-inspector"]);
        assert_eq!(args.config_path, PathBuf::from(DEFAULT_SCENARIO_PATH));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert!(!args.dispatch_log);
        assert_eq!(args.format, ReportFormat::Table);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::parse_from([
            "dispatch-inspector",
            "-c",
            "demo.toml",
            "--log-level",
            "debug",
            "--json-logs",
            "--dispatch-log",
            "--format",
            "json",
        ]);
        assert_eq!(args.config_path, PathBuf::from("demo.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert!(args.dispatch_log);
        assert_eq!(args.format, ReportFormat::Json);
    }
}
