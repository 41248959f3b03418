//! Service lifecycle state machine.
//!
//! The daemon's control context and the trap worker are decoupled: the worker
//! only reports `Started`/`Exited`, and operators drive the service with
//! `Interrogate`, `Stop` and `Shutdown` (delivered by the signal bridge or any
//! holder of a [`ServiceControl`]).
//!
//! ```text
//!                 Started                Stop | Shutdown              Exited
//! StartPending ----------> Running ----------------------> StopPending -------> Stopped
//!      |                      |                                                   ^
//!      |   Stop | Shutdown    |                         Exited                    |
//!      +----> StopPending     +---------------------------------------------------+
//! ```
//!
//! `Interrogate` never changes state. Every event in `Stopped` is ignored.

use std::fmt;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

use trapsink_core::metrics as m;

/// Externally visible service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    StartPending,
    Running,
    StopPending,
    Stopped,
}

impl ServiceState {
    /// Numeric code exported as the `trapsink_daemon_service_state` gauge.
    pub fn code(self) -> u8 {
        match self {
            Self::StartPending => 0,
            Self::Running => 1,
            Self::StopPending => 2,
            Self::Stopped => 3,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartPending => "start_pending",
            Self::Running => "running",
            Self::StopPending => "stop_pending",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Events that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Status query; answered without a state change.
    Interrogate,
    /// Operator stop request (SIGINT).
    Stop,
    /// System shutdown (SIGTERM).
    Shutdown,
    /// The worker bound its socket and entered the receive loop.
    Started,
    /// The worker task finished, for any reason.
    Exited,
}

/// Side effect the controller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Log the current state and pipeline counters.
    ReportStatus,
    /// Cancel the worker's receive loop.
    StopWorker,
    /// Leave the control loop.
    Finish,
}

/// The transition table.
pub fn transition(state: ServiceState, event: ControlEvent) -> (ServiceState, Action) {
    use ControlEvent as E;
    use ServiceState as S;

    match (state, event) {
        (S::Stopped, _) => (S::Stopped, Action::None),
        (s, E::Interrogate) => (s, Action::ReportStatus),

        (S::StartPending, E::Started) => (S::Running, Action::None),
        (S::StartPending | S::Running, E::Stop | E::Shutdown) => {
            (S::StopPending, Action::StopWorker)
        }
        (_, E::Exited) => (S::Stopped, Action::Finish),

        // duplicate stop requests and late Started are no-ops
        (s, _) => (s, Action::None),
    }
}

/// Sending half used to deliver control events to the daemon.
pub type ServiceControl = mpsc::Sender<ControlEvent>;

/// Holds the current state and publishes every change.
#[derive(Debug)]
pub struct ServiceMachine {
    state: ServiceState,
    tx: watch::Sender<ServiceState>,
}

impl ServiceMachine {
    /// Creates a machine in `StartPending`.
    pub fn new() -> (Self, watch::Receiver<ServiceState>) {
        let (tx, rx) = watch::channel(ServiceState::StartPending);
        metrics::gauge!(m::DAEMON_SERVICE_STATE).set(f64::from(ServiceState::StartPending.code()));
        (
            Self {
                state: ServiceState::StartPending,
                tx,
            },
            rx,
        )
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Another receiver for the state channel.
    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.tx.subscribe()
    }

    /// Applies one event and returns the action the caller must take.
    pub fn apply(&mut self, event: ControlEvent) -> Action {
        let (next, action) = transition(self.state, event);
        if next != self.state {
            tracing::info!(from = %self.state, to = %next, event = ?event, "service state changed");
            self.state = next;
            self.tx.send_replace(next);
            metrics::gauge!(m::DAEMON_SERVICE_STATE).set(f64::from(next.code()));
        } else {
            tracing::debug!(state = %self.state, event = ?event, "control event without transition");
        }
        action
    }
}

/// Forwards process signals into the control channel until `cancel` fires.
///
/// SIGINT maps to `Stop`, SIGTERM to `Shutdown`, SIGUSR1 to `Interrogate`.
/// On non-Unix targets only Ctrl-C is bridged, as `Stop`.
pub fn spawn_signal_bridge(
    control: ServiceControl,
    cancel: CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigusr1 = signal(SignalKind::user_defined1())
            .map_err(|e| anyhow::anyhow!("failed to install SIGUSR1 handler: {}", e))?;

        let bridge = async move {
            loop {
                let (name, event) = tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sigint.recv() => ("SIGINT", ControlEvent::Stop),
                    _ = sigterm.recv() => ("SIGTERM", ControlEvent::Shutdown),
                    _ = sigusr1.recv() => ("SIGUSR1", ControlEvent::Interrogate),
                };
                tracing::info!(signal = name, event = ?event, "signal received");
                if control.send(event).await.is_err() {
                    break;
                }
            }
            tracing::debug!("signal bridge shutting down");
        };
        Ok(tokio::spawn(bridge.with_current_subscriber()))
    }

    #[cfg(not(unix))]
    {
        let bridge = async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "failed to listen for ctrl-c");
                            break;
                        }
                        tracing::info!(signal = "ctrl_c", "signal received");
                        if control.send(ControlEvent::Stop).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("signal bridge shutting down");
        };
        Ok(tokio::spawn(bridge.with_current_subscriber()))
    }
}
