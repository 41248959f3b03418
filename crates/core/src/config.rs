//! 설정 관리 -- trapsink.toml 파싱 및 런타임 설정
//!
//! [`TrapsinkConfig`]는 데몬 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TRAPSINK_LISTENER_PORT=1162` 형식)
//! 3. 설정 파일 (`trapsink.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), trapsink_core::error::TrapsinkError> {
//! use trapsink_core::config::TrapsinkConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TrapsinkConfig::load("trapsink.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TrapsinkConfig::parse("[listener]\nport = 10162")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TrapsinkError};

/// SNMP 메시지 최소 재조립 크기 (RFC 3417). 이보다 작은 버퍼는 허용하지 않습니다.
pub const MIN_DATAGRAM_SIZE: usize = 484;

/// UDP 페이로드 최대 크기
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// trapsink 통합 설정
///
/// `trapsink.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrapsinkConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// UDP 리스너 설정
    #[serde(default)]
    pub listener: ListenerConfig,
    /// CSV 싱크 설정
    #[serde(default)]
    pub sink: SinkConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TrapsinkConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TrapsinkError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TrapsinkError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrapsinkError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TrapsinkError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TrapsinkError> {
        toml::from_str(toml_str).map_err(|e| {
            TrapsinkError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TRAPSINK_{SECTION}_{FIELD}`
    /// 예: `TRAPSINK_SINK_CSV_PATH=/var/lib/trapsink/traps.csv`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TRAPSINK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TRAPSINK_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "TRAPSINK_GENERAL_PID_FILE");
        override_string(&mut self.general.log_file, "TRAPSINK_GENERAL_LOG_FILE");

        // Listener
        override_string(
            &mut self.listener.bind_addr,
            "TRAPSINK_LISTENER_BIND_ADDR",
        );
        override_u16(&mut self.listener.port, "TRAPSINK_LISTENER_PORT");
        override_usize(
            &mut self.listener.max_datagram_size,
            "TRAPSINK_LISTENER_MAX_DATAGRAM_SIZE",
        );

        // Sink
        override_string(&mut self.sink.csv_path, "TRAPSINK_SINK_CSV_PATH");
        override_u64(&mut self.sink.max_size_mb, "TRAPSINK_SINK_MAX_SIZE_MB");
        override_usize(&mut self.sink.max_backups, "TRAPSINK_SINK_MAX_BACKUPS");
        override_u32(&mut self.sink.max_age_days, "TRAPSINK_SINK_MAX_AGE_DAYS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "TRAPSINK_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "TRAPSINK_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "TRAPSINK_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "TRAPSINK_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TrapsinkError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.listener.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(invalid(
                "listener.bind_addr",
                format!("'{}' is not an IP address", self.listener.bind_addr),
            ));
        }

        if !(MIN_DATAGRAM_SIZE..=MAX_DATAGRAM_SIZE).contains(&self.listener.max_datagram_size) {
            return Err(invalid(
                "listener.max_datagram_size",
                format!("must be between {MIN_DATAGRAM_SIZE} and {MAX_DATAGRAM_SIZE}"),
            ));
        }

        if self.sink.csv_path.trim().is_empty() {
            return Err(invalid("sink.csv_path", "must not be empty".to_owned()));
        }

        // max_size_mb * 1MiB가 u64를 넘지 않아야 함
        if self.sink.max_size_mb.checked_mul(1024 * 1024).is_none() {
            return Err(invalid("sink.max_size_mb", "value is too large".to_owned()));
        }

        if self.metrics.enabled {
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid(
                    "metrics.endpoint",
                    "must start with '/'".to_owned(),
                ));
            }
            if self.metrics.port == 0 {
                return Err(invalid(
                    "metrics.port",
                    "must not be 0 when metrics are enabled".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> TrapsinkError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
    /// 진단 로그 파일 경로 (빈 문자열이면 콘솔에만 기록, 상대 경로는 실행 파일 디렉토리 기준)
    pub log_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
            log_file: String::new(),
        }
    }
}

/// UDP 리스너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// 바인드할 로컬 주소
    pub bind_addr: String,
    /// 트랩 수신 포트 (0이면 OS가 임의 포트 할당)
    pub port: u16,
    /// 수신 버퍼 크기 (바이트). 더 긴 데이터그램은 잘립니다.
    pub max_datagram_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_owned(),
            port: 1162,
            max_datagram_size: 2048,
        }
    }
}

/// CSV 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// 활성 CSV 파일 경로. 상대 경로는 실행 파일 디렉토리 기준으로 해석됩니다.
    pub csv_path: String,
    /// 로테이션 크기 임계값 (MiB, 0이면 비활성)
    pub max_size_mb: u64,
    /// 보존할 백업 수 (0이면 무제한)
    pub max_backups: usize,
    /// 최대 보존 기간 (일, 0이면 무제한)
    pub max_age_days: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            csv_path: "snmp_traps.csv".to_owned(),
            max_size_mb: 1,
            max_backups: 0,
            max_age_days: 0,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9163,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
