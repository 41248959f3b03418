//! Integration tests for metrics server configuration checks.
//!
//! Only rejected configurations are exercised here: a successful install
//! replaces the process-wide recorder for every other test in the binary.

use serial_test::serial;
use trapsink_core::config::MetricsConfig;
use trapsink_daemon::metrics_server;

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_string(),
        port: 9163,
        endpoint: "/metrics".to_string(),
    };

    let result = metrics_server::install_metrics_recorder(&config);
    assert!(
        result.is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_unsupported_endpoint() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_string(),
        port: 19163,
        endpoint: "/custom".to_string(),
    };

    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();
    assert!(
        err.to_string().contains("/custom"),
        "error should name the endpoint, got: {}",
        err
    );
}
