//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `trapsink_`
//! - 컴포넌트명: `listener_`, `decoder_`, `sink_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use trapsink_core::metrics;
//!
//! metrics::counter!(trapsink_core::metrics::LISTENER_DATAGRAMS_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 디코딩 실패 분류 레이블 키 (truncated_input, unsupported_pdu, ...)
pub const LABEL_DECODE_ERROR: &str = "kind";

/// SNMP 버전 레이블 키 (v1, v2c)
pub const LABEL_VERSION: &str = "version";

/// 로테이션 사유 레이블 키 (size, age)
pub const LABEL_REASON: &str = "reason";

// ─── Listener 메트릭 ────────────────────────────────────────────────

/// Listener: 수신된 데이터그램 수 (counter)
pub const LISTENER_DATAGRAMS_RECEIVED_TOTAL: &str = "trapsink_listener_datagrams_received_total";

/// Listener: 수신 에러 수 (counter)
pub const LISTENER_RECV_ERRORS_TOTAL: &str = "trapsink_listener_recv_errors_total";

/// Listener: 데이터그램 처리 지연 시간 (histogram, 초)
pub const LISTENER_PROCESSING_DURATION_SECONDS: &str =
    "trapsink_listener_processing_duration_seconds";

// ─── Decoder 메트릭 ─────────────────────────────────────────────────

/// Decoder: 디코딩에 성공한 트랩 수 (counter, label: version)
pub const DECODER_TRAPS_DECODED_TOTAL: &str = "trapsink_decoder_traps_decoded_total";

/// Decoder: 디코딩 실패 수 (counter, label: kind)
pub const DECODER_ERRORS_TOTAL: &str = "trapsink_decoder_errors_total";

// ─── Sink 메트릭 ────────────────────────────────────────────────────

/// Sink: 기록된 CSV 행 수 (counter)
pub const SINK_ROWS_WRITTEN_TOTAL: &str = "trapsink_sink_rows_written_total";

/// Sink: 쓰기/로테이션 실패 수 (counter)
pub const SINK_ERRORS_TOTAL: &str = "trapsink_sink_errors_total";

/// Sink: 로테이션 수 (counter, label: reason)
pub const SINK_ROTATIONS_TOTAL: &str = "trapsink_sink_rotations_total";

/// Sink: 보존 정책으로 삭제된 백업 수 (counter)
pub const SINK_BACKUPS_PRUNED_TOTAL: &str = "trapsink_sink_backups_pruned_total";

/// Sink: 활성 파일 크기 (gauge, 바이트)
pub const SINK_ACTIVE_FILE_BYTES: &str = "trapsink_sink_active_file_bytes";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "trapsink_daemon_uptime_seconds";

/// Daemon: 서비스 상태 (gauge, 0=StartPending 1=Running 2=StopPending 3=Stopped)
pub const DAEMON_SERVICE_STATE: &str = "trapsink_daemon_service_state";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "trapsink_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 데이터그램 처리 지연 시간 히스토그램 버킷 (초)
///
/// 10us ~ 1s 범위. 디코딩은 마이크로초 단위, fsync가 포함되면 밀리초 단위
pub const PROCESSING_DURATION_BUCKETS: [f64; 10] = [
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 1.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
/// 일반적으로 `trapsink-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Listener
    describe_counter!(
        LISTENER_DATAGRAMS_RECEIVED_TOTAL,
        "Total number of UDP datagrams received on the trap port"
    );
    describe_counter!(
        LISTENER_RECV_ERRORS_TOTAL,
        "Total number of socket receive errors"
    );
    describe_histogram!(
        LISTENER_PROCESSING_DURATION_SECONDS,
        "Time to decode and persist a single datagram in seconds"
    );

    // Decoder
    describe_counter!(
        DECODER_TRAPS_DECODED_TOTAL,
        "Total number of SNMP traps decoded successfully"
    );
    describe_counter!(
        DECODER_ERRORS_TOTAL,
        "Total number of datagrams dropped because decoding failed"
    );

    // Sink
    describe_counter!(
        SINK_ROWS_WRITTEN_TOTAL,
        "Total number of CSV rows flushed to the active file"
    );
    describe_counter!(
        SINK_ERRORS_TOTAL,
        "Total number of failed CSV appends or rotations"
    );
    describe_counter!(SINK_ROTATIONS_TOTAL, "Total number of CSV file rotations");
    describe_counter!(
        SINK_BACKUPS_PRUNED_TOTAL,
        "Total number of rotated CSV backups deleted by the retention policy"
    );
    describe_gauge!(
        SINK_ACTIVE_FILE_BYTES,
        "Size of the active CSV file in bytes"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "trapsink daemon uptime in seconds");
    describe_gauge!(
        DAEMON_SERVICE_STATE,
        "Service state (0=start_pending, 1=running, 2=stop_pending, 3=stopped)"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
