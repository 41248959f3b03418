//! 트랩 파이프라인 에러 타입
//!
//! [`TrapPipelineError`]는 파이프라인 밖으로 전파되는 에러만 표현합니다.
//! 디코딩 실패와 행 단위 쓰기 실패는 수신 루프 안에서 로그로 처리되고
//! 여기까지 올라오지 않습니다.
//! `From<TrapPipelineError> for TrapsinkError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use trapsink_core::error::{ConfigError, PipelineError, SinkError, TrapsinkError};

/// 트랩 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TrapPipelineError {
    /// UDP 소켓 바인드 실패 (치명적, 처리 시작 전에 반환)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// 바인드 대상 주소
        addr: String,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 싱크 열기/닫기 실패
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 점 표기 OID 문자열이 올바르지 않음 (인코더 전용)
    #[error("invalid OID '{oid}': {reason}")]
    InvalidOid {
        /// 입력 OID
        oid: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<TrapPipelineError> for TrapsinkError {
    fn from(err: TrapPipelineError) -> Self {
        match err {
            TrapPipelineError::Bind { addr, source } => {
                TrapsinkError::Pipeline(PipelineError::BindFailed {
                    addr,
                    reason: source.to_string(),
                })
            }
            TrapPipelineError::Sink(e) => TrapsinkError::Sink(e),
            TrapPipelineError::Config { field, reason } => {
                TrapsinkError::Config(ConfigError::InvalidValue { field, reason })
            }
            other @ TrapPipelineError::InvalidOid { .. } => {
                TrapsinkError::Pipeline(PipelineError::InitFailed(other.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_display() {
        let err = TrapPipelineError::Bind {
            addr: "0.0.0.0:162".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let msg = err.to_string();
        assert!(msg.contains("0.0.0.0:162"));
    }

    #[test]
    fn bind_error_converts_to_pipeline_error() {
        let err = TrapPipelineError::Bind {
            addr: "0.0.0.0:162".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        let core_err: TrapsinkError = err.into();
        assert!(matches!(
            core_err,
            TrapsinkError::Pipeline(PipelineError::BindFailed { .. })
        ));
    }

    #[test]
    fn config_error_converts_to_invalid_value() {
        let err = TrapPipelineError::Config {
            field: "max_depth".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        let core_err: TrapsinkError = err.into();
        assert!(core_err.to_string().contains("max_depth"));
    }

    #[test]
    fn sink_error_is_preserved() {
        let err: TrapPipelineError = SinkError::Closed.into();
        let core_err: TrapsinkError = err.into();
        assert!(matches!(core_err, TrapsinkError::Sink(SinkError::Closed)));
    }
}
