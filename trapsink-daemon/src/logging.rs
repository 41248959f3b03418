//! Logging setup for trapsink-daemon.
//!
//! Builds an explicit [`Dispatch`] from the `[general]` section of
//! `TrapsinkConfig` instead of installing a process-global subscriber.
//! `main` makes it the default for the control context with
//! [`tracing::dispatcher::set_default`], and every spawned task carries it
//! along via [`WithSubscriber`](tracing::instrument::WithSubscriber).
//!
//! When `log_file` is set, events are also written to that file through a
//! non-blocking `tracing-appender` writer.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::Dispatch;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

use trapsink_core::config::GeneralConfig;

use crate::paths;

/// Where the effective filter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    /// `RUST_LOG` wins over `log_level` when set and valid.
    EnvThenConfig,
    /// `log_level` was given on the command line; `RUST_LOG` is ignored.
    ConfigOnly,
}

/// The daemon's dispatcher and, when a log file is configured, the guard of
/// its background writer.
///
/// Keep this alive until the process exits. Dropping it flushes buffered
/// file output and stops the writer thread.
pub struct DaemonLogging {
    pub dispatch: Dispatch,
    /// Resolved log file path, if file logging is enabled.
    pub log_file: Option<PathBuf>,
    _file_guard: Option<WorkerGuard>,
}

/// Build the dispatcher for the daemon.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default for production)
/// * `"pretty"` - Human-readable multi-line output (for development)
///
/// The file layer uses the same format with ANSI colors disabled.
pub fn build_dispatch(config: &GeneralConfig, source: FilterSource) -> Result<DaemonLogging> {
    let json = match config.log_format.as_str() {
        "json" => true,
        "pretty" => false,
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            ));
        }
    };
    let filter = env_filter(&config.log_level, source)?;

    let log_file = match config.log_file.trim() {
        "" => None,
        path => Some(paths::resolve_from_exe_dir(path, paths::exe_dir().as_deref())),
    };
    let (writer, guard) = match &log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let dispatch = if json {
        Dispatch::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .with(writer.map(|w| {
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(w)
                })),
        )
    } else {
        Dispatch::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .with(writer.map(|w| {
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(w)
                })),
        )
    };

    Ok(DaemonLogging {
        dispatch,
        log_file,
        _file_guard: guard,
    })
}

fn env_filter(level: &str, source: FilterSource) -> Result<EnvFilter> {
    if source == FilterSource::EnvThenConfig {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(level).map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", level, e))
}

/// Open `path` for appending behind a non-blocking writer.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("log file '{}' does not name a file", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    std::fs::create_dir_all(dir).map_err(|e| {
        anyhow::anyhow!("failed to create log directory {}: {}", dir.display(), e)
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| anyhow::anyhow!("failed to open log file {}: {}", path.display(), e))?;

    Ok(tracing_appender::non_blocking(appender))
}
