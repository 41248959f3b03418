//! Daemon assembly and lifecycle management.
//!
//! The [`Orchestrator`] builds the trap pipeline from configuration, binds
//! the listener, runs the receive loop as a separate worker task and drives
//! the service state machine from control events until the worker exits.
//!
//! # Startup
//!
//! 1. Validate configuration, install the metrics recorder if enabled
//! 2. Resolve the CSV path and build the pipeline
//! 3. Write the PID file (if configured)
//! 4. Bind the UDP socket; failure aborts before any processing
//! 5. Spawn the worker, which opens the CSV sink, and report `Started`
//!
//! # Shutdown
//!
//! `Stop`/`Shutdown` cancels the worker; the datagram in flight is written,
//! the sink is flushed and closed, and the worker reports `Exited`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

use trapsink_core::config::TrapsinkConfig;
use trapsink_pipeline::{
    PipelineConfig, PipelineHandle, TrapListener, TrapPipeline, TrapPipelineBuilder,
    TrapPipelineError,
};

use crate::{metrics_server, paths};
use crate::service::{
    Action, ControlEvent, ServiceControl, ServiceMachine, ServiceState, spawn_signal_bridge,
};

/// Control channel capacity.
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// The daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: TrapsinkConfig,
    /// Absolute path of the active CSV file.
    csv_path: PathBuf,
    /// Pipeline waiting to be moved into the worker task.
    pipeline: Option<TrapPipeline>,
    handle: PipelineHandle,
    listener: Option<TrapListener>,
    machine: ServiceMachine,
    control_tx: ServiceControl,
    control_rx: mpsc::Receiver<ControlEvent>,
    /// Bridge SIGINT/SIGTERM/SIGUSR1 into the control channel.
    handle_signals: bool,
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the metrics recorder cannot be
    /// installed, or the pipeline configuration is rejected.
    pub fn build_from_config(config: TrapsinkConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        let csv_path = paths::resolve_from_exe_dir(&config.sink.csv_path, paths::exe_dir().as_deref());

        let mut pipeline_config = PipelineConfig::from_core(&config);
        pipeline_config.csv_path = csv_path.clone();

        let (pipeline, handle) = TrapPipelineBuilder::new()
            .config(pipeline_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build trap pipeline: {}", e))?;

        let (machine, _) = ServiceMachine::new();
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

        tracing::info!(
            port = config.listener.port,
            csv = %csv_path.display(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            csv_path,
            pipeline: Some(pipeline),
            handle,
            listener: None,
            machine,
            control_tx,
            control_rx,
            handle_signals: true,
            start_time: Instant::now(),
        })
    }

    /// Enable or disable the process signal bridge (enabled by default).
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Sender for delivering `Interrogate`, `Stop` and `Shutdown`.
    pub fn control(&self) -> ServiceControl {
        self.control_tx.clone()
    }

    /// Receiver that observes every state change.
    pub fn state(&self) -> watch::Receiver<ServiceState> {
        self.machine.subscribe()
    }

    /// Handle to the trap pipeline (stop, counters).
    pub fn pipeline_handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Absolute path of the active CSV file.
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Reference to the loaded configuration.
    pub fn config(&self) -> &TrapsinkConfig {
        &self.config
    }

    /// Bind the UDP socket ahead of [`run`](Self::run) and return its address.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }
        // TrapPipeline is not Sync; keep its borrow out of the await
        let bind = match &self.pipeline {
            Some(pipeline) => pipeline.bind(),
            None => return Err(anyhow::anyhow!("orchestrator has already run")),
        };
        let listener = bind.await?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Run until the worker exits, normally after `Stop` or `Shutdown`.
    pub async fn run(&mut self) -> Result<()> {
        let pid_file = self.config.general.pid_file.clone();
        if !pid_file.is_empty() {
            write_pid_file(Path::new(&pid_file))?;
        }

        let result = self.run_service().await;

        if !pid_file.is_empty() {
            remove_pid_file(Path::new(&pid_file));
        }
        result
    }

    async fn run_service(&mut self) -> Result<()> {
        if let Err(e) = self.bind().await {
            tracing::error!(error = %e, "failed to bind trap listener");
            self.machine.apply(ControlEvent::Exited);
            return Err(e);
        }

        let (Some(pipeline), Some(listener)) = (self.pipeline.take(), self.listener.take()) else {
            return Err(anyhow::anyhow!("orchestrator has already run"));
        };
        let mut worker: JoinHandle<Result<(), TrapPipelineError>> =
            tokio::spawn(pipeline.serve(listener).with_current_subscriber());
        self.machine.apply(ControlEvent::Started);

        let tasks_cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        if self.handle_signals {
            let bridge = spawn_signal_bridge(self.control_tx.clone(), tasks_cancel.clone());
            match bridge {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    // without signal handling the daemon could not be stopped
                    self.handle.stop();
                    if let Err(worker_err) = worker_result(worker.await) {
                        tracing::warn!(error = %worker_err, "trap worker failed during aborted startup");
                    }
                    self.machine.apply(ControlEvent::Exited);
                    return Err(e);
                }
            }
        }
        if self.config.metrics.enabled {
            tasks.push(spawn_uptime_updater(self.start_time, tasks_cancel.clone()));
        }

        tracing::info!("trapsink running");
        let outcome = loop {
            tokio::select! {
                joined = &mut worker => {
                    self.machine.apply(ControlEvent::Exited);
                    break worker_result(joined);
                }
                Some(event) = self.control_rx.recv() => {
                    self.on_control_event(event);
                }
            }
        };

        tasks_cancel.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task did not shut down cleanly");
            }
        }

        let stats = self.handle.stats();
        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            received = stats.received,
            rows_written = stats.rows_written,
            "trapsink stopped"
        );
        outcome
    }

    fn on_control_event(&mut self, event: ControlEvent) {
        if matches!(event, ControlEvent::Started | ControlEvent::Exited) {
            tracing::warn!(event = ?event, "worker lifecycle events cannot be sent externally");
            return;
        }
        match self.machine.apply(event) {
            Action::StopWorker => self.handle.stop(),
            Action::ReportStatus => self.report_status(),
            Action::None | Action::Finish => {}
        }
    }

    fn report_status(&self) {
        let stats = self.handle.stats();
        tracing::info!(
            state = %self.machine.state(),
            uptime_secs = self.start_time.elapsed().as_secs(),
            received = stats.received,
            decoded = stats.decoded,
            decode_errors = stats.decode_errors,
            rows_written = stats.rows_written,
            sink_errors = stats.sink_errors,
            recv_errors = stats.recv_errors,
            csv = %self.csv_path.display(),
            "service status"
        );
    }
}

/// Flatten the worker's join result into the daemon's error type.
fn worker_result(
    joined: std::result::Result<std::result::Result<(), TrapPipelineError>, JoinError>,
) -> Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(anyhow::anyhow!("trap pipeline failed: {}", e)),
        Err(e) => Err(anyhow::anyhow!("trap worker panicked or was aborted: {}", e)),
    }
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - `create_new(true)` makes creation atomic, so a second instance fails
/// - The created file must be a regular file
/// - Parent directory is created 0o700, the file 0o600
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new().mode(0o700).recursive(true).create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another trapsink running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    let pid = std::process::id();
    writeln!(file, "{}", pid)?;
    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failure is logged, never returned.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

/// Record build info once at startup.
fn record_daemon_metrics() {
    use trapsink_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, m::LABEL_VERSION => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Periodically refresh the uptime gauge until `cancel` fires.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    use trapsink_core::metrics as m;

    tokio::spawn(
        async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(10));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        #[allow(clippy::cast_precision_loss)]
                        metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                            .set(start_time.elapsed().as_secs() as f64);
                    }
                    _ = cancel.cancelled() => {
                        tracing::debug!("uptime updater shutting down");
                        break;
                    }
                }
            }
        }
        .with_current_subscriber(),
    )
}
