//! trapsink.toml 통합 설정 테스트
//!
//! - trapsink.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use trapsink_core::config::TrapsinkConfig;
use trapsink_core::error::{ConfigError, TrapsinkError};

// =============================================================================
// trapsink.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../trapsink.toml.example");
    let config = TrapsinkConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert!(config.general.pid_file.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../trapsink.toml.example");
    let config = TrapsinkConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../trapsink.toml.example");
    let example = TrapsinkConfig::parse(content).expect("should parse");
    let defaults = TrapsinkConfig::default();

    assert_eq!(example.listener.bind_addr, defaults.listener.bind_addr);
    assert_eq!(example.listener.port, defaults.listener.port);
    assert_eq!(
        example.listener.max_datagram_size,
        defaults.listener.max_datagram_size
    );
    assert_eq!(example.sink.csv_path, defaults.sink.csv_path);
    assert_eq!(example.sink.max_size_mb, defaults.sink.max_size_mb);
    assert_eq!(example.sink.max_backups, defaults.sink.max_backups);
    assert_eq!(example.sink.max_age_days, defaults.sink.max_age_days);
    assert_eq!(example.metrics.enabled, defaults.metrics.enabled);
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_sink_only() {
    let toml = r#"
[sink]
csv_path = "/var/lib/trapsink/traps.csv"
max_backups = 10
"#;
    let config = TrapsinkConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.sink.csv_path, "/var/lib/trapsink/traps.csv");
    assert_eq!(config.sink.max_backups, 10);
    // 다른 섹션은 기본값
    assert_eq!(config.listener.port, 1162);
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_listener_only() {
    let toml = r#"
[listener]
bind_addr = "::"
port = 162
"#;
    let config = TrapsinkConfig::parse(toml).expect("should parse");
    config.validate().expect("IPv6 wildcard should be accepted");
    assert_eq!(config.listener.bind_addr, "::");
    assert_eq!(config.listener.max_datagram_size, 2048);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[sink]
max_size_mb = 1
"#;

    let original = std::env::var("TRAPSINK_SINK_MAX_SIZE_MB").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("TRAPSINK_SINK_MAX_SIZE_MB", "25");
    }

    let mut config = TrapsinkConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.sink.max_size_mb;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("TRAPSINK_SINK_MAX_SIZE_MB", val),
            None => std::env::remove_var("TRAPSINK_SINK_MAX_SIZE_MB"),
        }
    }

    assert_eq!(result, 25);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let original = std::env::var("TRAPSINK_METRICS_ENABLED").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("TRAPSINK_METRICS_ENABLED", "true");
    }

    let mut config = TrapsinkConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.metrics.enabled;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("TRAPSINK_METRICS_ENABLED", val),
            None => std::env::remove_var("TRAPSINK_METRICS_ENABLED"),
        }
    }

    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_keeps_toml_value() {
    let toml = r#"
[listener]
port = 10162
"#;

    let original = std::env::var("TRAPSINK_LISTENER_PORT").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("TRAPSINK_LISTENER_PORT", "not-a-port");
    }

    let mut config = TrapsinkConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.listener.port;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("TRAPSINK_LISTENER_PORT", val),
            None => std::env::remove_var("TRAPSINK_LISTENER_PORT"),
        }
    }

    assert_eq!(result, 10162);
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = TrapsinkConfig::parse("").expect("empty string should parse");
    config.validate().expect("should validate");
    assert_eq!(config.listener.port, 1162);
    assert!(!config.metrics.enabled);
}

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# 이것은 주석입니다
# 모든 줄이 주석입니다
"#;
    let config = TrapsinkConfig::parse(toml).expect("comments-only should parse");
    config.validate().expect("should validate");
    assert_eq!(config.sink.csv_path, "snmp_traps.csv");
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[listener]
port = "one thousand"
"#;
    let result = TrapsinkConfig::parse(toml);
    assert!(matches!(
        result.unwrap_err(),
        TrapsinkError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn port_out_of_range_is_parse_error() {
    let toml = r#"
[listener]
port = 70000
"#;
    assert!(TrapsinkConfig::parse(toml).is_err());
}

#[tokio::test]
async fn load_from_disk_applies_validation() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("trapsink.toml");
    std::fs::write(
        &path,
        "[listener]\nmax_datagram_size = 16\n",
    )
    .expect("should write config");

    let result = TrapsinkConfig::from_file(&path).await;
    assert!(matches!(
        result.unwrap_err(),
        TrapsinkError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{}/../../trapsink.toml.example", manifest_dir);

    let config = TrapsinkConfig::from_file(&example_path)
        .await
        .expect("example config should load");
    assert_eq!(config.listener.port, 1162);
}
