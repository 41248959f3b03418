//! 에러 타입 -- 도메인별 에러 정의

/// trapsink 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TrapsinkError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 트랩 디코딩 에러
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// CSV 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// SNMP 트랩 디코딩 에러
///
/// 모든 변형은 복구 가능합니다. 리스너는 해당 데이터그램만 버리고
/// 수신 루프를 계속합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 선언된 길이가 남은 버퍼보다 큼
    #[error("truncated input at offset {offset}: need {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// 트랩이 아닌 PDU 태그
    #[error("unsupported PDU tag 0x{tag:02x}")]
    UnsupportedPdu { tag: u8 },

    /// v1/v2c 이외의 SNMP 버전 (v3 포함)
    #[error("unsupported SNMP version {version}")]
    UnsupportedVersion { version: i64 },

    /// 태그/길이 조합이 내부적으로 모순됨
    #[error("malformed encoding at offset {offset}: {reason}")]
    MalformedEncoding { offset: usize, reason: String },
}

impl DecodeError {
    /// 메트릭 레이블과 로그 필드에 쓰는 짧은 분류명
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TruncatedInput { .. } => "truncated_input",
            Self::UnsupportedPdu { .. } => "unsupported_pdu",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::MalformedEncoding { .. } => "malformed_encoding",
        }
    }

    /// `MalformedEncoding` 생성 헬퍼
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            offset,
            reason: reason.into(),
        }
    }
}

/// CSV 싱크 에러
///
/// 파이프라인은 이 에러를 로그로 남기고 다음 append를 계속 시도합니다.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 활성 파일 열기 실패
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 행 쓰기 또는 flush 실패
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 로테이션(rename/재생성) 실패
    #[error("failed to rotate {path}: {reason}")]
    Rotate { path: String, reason: String },

    /// 이미 닫힌 싱크에 append
    #[error("sink is closed")]
    Closed,
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// UDP 소켓 바인드 실패 (치명적)
    #[error("failed to bind {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_kind_labels() {
        let err = DecodeError::TruncatedInput {
            offset: 1,
            needed: 127,
            remaining: 1,
        };
        assert_eq!(err.kind(), "truncated_input");
        assert_eq!(DecodeError::UnsupportedPdu { tag: 0xa0 }.kind(), "unsupported_pdu");
        assert_eq!(
            DecodeError::malformed(3, "bad tag").kind(),
            "malformed_encoding"
        );
    }

    #[test]
    fn decode_error_display_includes_offsets() {
        let err = DecodeError::TruncatedInput {
            offset: 2,
            needed: 127,
            remaining: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 2"));
        assert!(msg.contains("127"));

        let err = DecodeError::UnsupportedPdu { tag: 0xa2 };
        assert!(err.to_string().contains("0xa2"));
    }

    #[test]
    fn sink_error_converts_to_top_level() {
        let err: TrapsinkError = SinkError::Closed.into();
        assert!(matches!(err, TrapsinkError::Sink(SinkError::Closed)));
    }

    #[test]
    fn sink_error_keeps_io_source() {
        use std::error::Error as _;

        let err = SinkError::Write {
            path: "/var/lib/trapsink/snmp_traps.csv".to_owned(),
            source: std::io::Error::other("disk full"),
        };
        assert!(err.to_string().contains("snmp_traps.csv"));
        assert!(err.source().is_some());
    }
}
