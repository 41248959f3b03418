//! Orchestrator lifecycle tests.
//!
//! Runs the daemon against a loopback socket and a temporary CSV file and
//! drives it through the control channel instead of process signals.

use std::path::Path;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;

use trapsink_core::config::TrapsinkConfig;
use trapsink_daemon::orchestrator::Orchestrator;
use trapsink_daemon::service::{ControlEvent, ServiceState};
use trapsink_pipeline::{CSV_HEADER, TrapEncoder, TrapValue};

fn test_config(dir: &Path, port: u16) -> TrapsinkConfig {
    let mut config = TrapsinkConfig::default();
    config.listener.bind_addr = "127.0.0.1".to_owned();
    config.listener.port = port;
    config.sink.csv_path = dir.join("snmp_traps.csv").display().to_string();
    config.general.pid_file = dir.join("trapsink.pid").display().to_string();
    config
}

async fn wait_for_state(rx: &mut watch::Receiver<ServiceState>, target: ServiceState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
        .await
        .expect("timed out waiting for service state")
        .expect("state channel closed");
}

#[tokio::test]
async fn test_full_lifecycle_writes_traps_and_cleans_up() {
    // Given: A daemon bound to an ephemeral loopback port
    let dir = tempfile::tempdir().expect("should create temp dir");
    let config = test_config(dir.path(), 0);
    let pid_path = dir.path().join("trapsink.pid");

    let mut orchestrator = Orchestrator::build_from_config(config)
        .expect("should build orchestrator")
        .handle_signals(false);
    let addr = orchestrator.bind().await.expect("should bind");
    let control = orchestrator.control();
    let mut state = orchestrator.state();
    let handle = orchestrator.pipeline_handle();
    let csv_path = orchestrator.csv_path().to_path_buf();
    assert_eq!(csv_path, dir.path().join("snmp_traps.csv"));

    let daemon = tokio::spawn(async move { orchestrator.run().await });
    wait_for_state(&mut state, ServiceState::Running).await;
    assert!(pid_path.exists(), "PID file should exist while running");

    // When: A trap arrives and the operator stops the service
    let trap = TrapEncoder::v1("public")
        .binding("1.3.6.1.2.1.1.3.0", TrapValue::TimeTicks(12345))
        .encode()
        .unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&trap, addr).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.stats().rows_written < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("trap was not written");

    control.send(ControlEvent::Interrogate).await.unwrap();
    control.send(ControlEvent::Stop).await.unwrap();

    // Then: The daemon stops cleanly
    let result = tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon did not stop")
        .expect("daemon task panicked");
    assert!(result.is_ok(), "run should succeed: {:?}", result.err());
    assert_eq!(*state.borrow(), ServiceState::Stopped);
    assert!(!pid_path.exists(), "PID file should be removed");

    let content = std::fs::read_to_string(&csv_path).unwrap();
    assert!(content.starts_with(CSV_HEADER));
    assert!(content.ends_with(",1.3.6.1.2.1.1.3.0,TimeTicks,12345\n"));
}

#[tokio::test]
async fn test_shutdown_event_stops_service() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let mut orchestrator = Orchestrator::build_from_config(test_config(dir.path(), 0))
        .expect("should build orchestrator")
        .handle_signals(false);
    orchestrator.bind().await.expect("should bind");
    let control = orchestrator.control();
    let mut state = orchestrator.state();

    let daemon = tokio::spawn(async move { orchestrator.run().await });
    wait_for_state(&mut state, ServiceState::Running).await;

    control.send(ControlEvent::Shutdown).await.unwrap();
    wait_for_state(&mut state, ServiceState::Stopped).await;
    daemon.await.unwrap().expect("run should succeed");
}

#[tokio::test]
async fn test_external_worker_events_are_ignored() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let mut orchestrator = Orchestrator::build_from_config(test_config(dir.path(), 0))
        .expect("should build orchestrator")
        .handle_signals(false);
    orchestrator.bind().await.expect("should bind");
    let control = orchestrator.control();
    let mut state = orchestrator.state();
    let handle = orchestrator.pipeline_handle();

    let daemon = tokio::spawn(async move { orchestrator.run().await });
    wait_for_state(&mut state, ServiceState::Running).await;

    // Exited may only come from the worker itself
    control.send(ControlEvent::Exited).await.unwrap();
    control.send(ControlEvent::Interrogate).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*state.borrow(), ServiceState::Running);
    assert!(!handle.is_stopped());

    control.send(ControlEvent::Stop).await.unwrap();
    daemon.await.unwrap().expect("run should succeed");
}

#[tokio::test]
async fn test_bind_failure_is_fatal_and_removes_pid_file() {
    // Given: The configured port is already taken
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();
    let dir = tempfile::tempdir().expect("should create temp dir");

    let mut orchestrator = Orchestrator::build_from_config(test_config(dir.path(), port))
        .expect("should build orchestrator")
        .handle_signals(false);
    let state = orchestrator.state();

    // When: Running
    let err = orchestrator.run().await.unwrap_err();

    // Then: The error surfaces and nothing is left behind
    assert!(err.to_string().contains("bind"), "got: {}", err);
    assert_eq!(*state.borrow(), ServiceState::Stopped);
    assert!(!dir.path().join("trapsink.pid").exists());
    assert!(
        !dir.path().join("snmp_traps.csv").exists(),
        "CSV file must not be created when the socket cannot be bound"
    );
}

#[tokio::test]
async fn test_second_run_is_rejected() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let mut config = test_config(dir.path(), 0);
    config.general.pid_file = String::new();
    let mut orchestrator = Orchestrator::build_from_config(config)
        .expect("should build orchestrator")
        .handle_signals(false);

    orchestrator.pipeline_handle().stop();
    orchestrator.run().await.expect("first run should succeed");
    assert!(orchestrator.run().await.is_err());
}

#[test]
fn test_invalid_config_fails_build() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let mut config = test_config(dir.path(), 0);
    config.general.log_format = "xml".to_owned();

    let err = Orchestrator::build_from_config(config).err().expect("should fail");
    assert!(err.to_string().contains("log_format"), "got: {}", err);
}
