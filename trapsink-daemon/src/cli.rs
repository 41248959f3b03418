//! CLI argument definitions for trapsink-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use trapsink_core::config::TrapsinkConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/trapsink/trapsink.toml";

/// SNMP trap capture daemon.
///
/// Listens for SNMPv1/v2c traps on UDP and appends every variable binding
/// as a row to a size/age rotated CSV file.
#[derive(Parser, Debug)]
#[command(name = "trapsink-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to trapsink.toml configuration file.
    ///
    /// When the default path does not exist, built-in defaults are used.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and `RUST_LOG`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Also write logs to this file. Relative paths resolve against the
    /// executable's directory.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Override UDP listen port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override CSV output path. Relative paths resolve against the
    /// executable's directory.
    #[arg(long)]
    pub csv_file: Option<String>,
}

impl DaemonCli {
    /// Whether `--config` still points at the built-in default.
    pub fn uses_default_config(&self) -> bool {
        self.config.as_os_str() == DEFAULT_CONFIG_PATH
    }

    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut TrapsinkConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.general.log_file = log_file.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(csv) = &self.csv_file {
            config.sink.csv_path = csv.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["trapsink-daemon"]);
        assert!(cli.uses_default_config());
        assert!(!cli.validate);
        assert!(cli.port.is_none());
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = DaemonCli::parse_from([
            "trapsink-daemon",
            "--config",
            "/tmp/t.toml",
            "--log-level",
            "debug",
            "--port",
            "10162",
            "--csv-file",
            "/var/lib/trapsink/traps.csv",
            "--pid-file",
            "/run/trapsink.pid",
            "--log-file",
            "service.log",
        ]);
        assert!(!cli.uses_default_config());

        let mut config = TrapsinkConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.general.pid_file, "/run/trapsink.pid");
        assert_eq!(config.general.log_file, "service.log");
        assert_eq!(config.listener.port, 10162);
        assert_eq!(config.sink.csv_path, "/var/lib/trapsink/traps.csv");
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert!(DaemonCli::try_parse_from(["trapsink-daemon", "--port", "70000"]).is_err());
    }
}
