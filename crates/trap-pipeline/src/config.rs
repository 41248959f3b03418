//! 트랩 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`TrapsinkConfig`]에서 리스너/싱크 섹션을 가져오고
//! 디코더 한도 같은 파이프라인 전용 설정을 더합니다.
//!
//! # 사용 예시
//! ```ignore
//! use trapsink_core::config::TrapsinkConfig;
//! use trapsink_pipeline::config::PipelineConfig;
//!
//! let core_config = TrapsinkConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use trapsink_core::config::{MAX_DATAGRAM_SIZE, MIN_DATAGRAM_SIZE, SinkConfig, TrapsinkConfig};

use crate::error::TrapPipelineError;

/// 디코더 기본 최대 중첩 깊이
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// 디코더 기본 최대 입력 크기 (바이트)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 65_535;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// 로테이션 정책
///
/// 시작 시 한 번 정해지고 이후 바뀌지 않습니다. 모든 값에서 0은 "제한 없음"입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationPolicy {
    /// 활성 파일 최대 크기 (바이트)
    pub max_size_bytes: u64,
    /// 보존할 백업 수
    pub max_backups: usize,
    /// 활성 파일/백업 최대 보존 기간 (일)
    pub max_age_days: u32,
}

impl RotationPolicy {
    /// core의 `SinkConfig`에서 정책을 생성합니다. (`max_size_mb`는 MiB 단위)
    pub fn from_core(sink: &SinkConfig) -> Self {
        Self {
            max_size_bytes: sink.max_size_mb.saturating_mul(1024 * 1024),
            max_backups: sink.max_backups,
            max_age_days: sink.max_age_days,
        }
    }

    /// 최대 보존 기간. 0일이면 `None`
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_days > 0).then(|| Duration::from_secs(u64::from(self.max_age_days) * SECS_PER_DAY))
    }
}

/// 트랩 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 바인드 IP 주소
    pub bind_addr: String,
    /// 수신 포트 (0이면 임의 포트)
    pub port: u16,
    /// 수신 버퍼 크기
    pub max_datagram_size: usize,
    /// 활성 CSV 파일 경로 (이미 해석된 경로)
    pub csv_path: PathBuf,
    /// 로테이션 정책
    pub rotation: RotationPolicy,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 디코더 최대 중첩 깊이
    pub max_depth: usize,
    /// 디코더 최대 입력 크기
    pub max_input_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&TrapsinkConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    /// `csv_path`는 그대로 복사되므로 상대 경로 해석은 호출자가 합니다.
    pub fn from_core(core: &TrapsinkConfig) -> Self {
        Self {
            bind_addr: core.listener.bind_addr.clone(),
            port: core.listener.port,
            max_datagram_size: core.listener.max_datagram_size,
            csv_path: PathBuf::from(&core.sink.csv_path),
            rotation: RotationPolicy::from_core(&core.sink),
            max_depth: DEFAULT_MAX_DEPTH,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 바인드할 소켓 주소를 반환합니다.
    pub fn socket_addr(&self) -> Result<SocketAddr, TrapPipelineError> {
        let ip: IpAddr = self
            .bind_addr
            .parse()
            .map_err(|e| TrapPipelineError::Config {
                field: "bind_addr".to_owned(),
                reason: format!("'{}': {}", self.bind_addr, e),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TrapPipelineError> {
        self.socket_addr()?;

        if !(MIN_DATAGRAM_SIZE..=MAX_DATAGRAM_SIZE).contains(&self.max_datagram_size) {
            return Err(TrapPipelineError::Config {
                field: "max_datagram_size".to_owned(),
                reason: format!("must be {}-{}", MIN_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE),
            });
        }

        if self.csv_path.as_os_str().is_empty() {
            return Err(TrapPipelineError::Config {
                field: "csv_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.csv_path.file_name().is_none() {
            return Err(TrapPipelineError::Config {
                field: "csv_path".to_owned(),
                reason: format!("'{}' does not name a file", self.csv_path.display()),
            });
        }

        if self.max_depth == 0 {
            return Err(TrapPipelineError::Config {
                field: "max_depth".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_input_size == 0 {
            return Err(TrapPipelineError::Config {
                field: "max_input_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}
