//! 파이프라인 오케스트레이션 -- 수신/디코딩/기록의 전체 흐름을 관리합니다.
//!
//! # 내부 아키텍처
//! ```text
//! UdpSocket -> TrapListener -> TrapDecoder -> TrapMessage::rows -> TrapSink
//!                   ^
//!            CancellationToken (PipelineHandle::stop)
//! ```
//!
//! 워커는 하나이며 수신-디코딩-기록 사이클을 한 번에 하나씩 실행합니다.
//! 소켓과 싱크는 워커만 만지므로 잠금이 없습니다.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trapsink_core::error::{DecodeError, SinkError};
use trapsink_core::metrics as m;
use trapsink_core::pipeline::{TrapDecoder, TrapSink};
use trapsink_core::types::TrapMessage;

use crate::config::PipelineConfig;
use crate::decoder::SnmpTrapDecoder;
use crate::error::TrapPipelineError;
use crate::listener::TrapListener;
use crate::sink::RotatingCsvSink;

/// 연속 수신 에러 시 첫 대기 시간
const RECV_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// 연속 수신 에러 시 최대 대기 시간
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// 연속 수신 에러가 이 배수일 때마다 warn 로그를 다시 남김
const RECV_ERROR_LOG_EVERY: u64 = 100;

/// 연속 수신 에러 횟수에 따른 다음 수신까지의 대기 시간 (지수 증가, 상한 있음)
fn recv_backoff(consecutive: u64) -> Duration {
    let shift = consecutive.saturating_sub(1).min(16) as u32;
    RECV_BACKOFF_BASE
        .saturating_mul(1u32 << shift)
        .min(RECV_BACKOFF_MAX)
}

/// 파이프라인 카운터
///
/// 워커가 갱신하고 [`PipelineHandle`]로 어디서든 읽습니다.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    decoded: AtomicU64,
    decode_errors: AtomicU64,
    rows_written: AtomicU64,
    sink_errors: AtomicU64,
    recv_errors: AtomicU64,
}

/// [`PipelineStats`]의 특정 시점 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// 수신된 데이터그램 수
    pub received: u64,
    /// 디코딩에 성공한 트랩 수
    pub decoded: u64,
    /// 디코딩 실패 수
    pub decode_errors: u64,
    /// 기록된 CSV 행 수
    pub rows_written: u64,
    /// 싱크 실패 수
    pub sink_errors: u64,
    /// 소켓 수신 에러 수
    pub recv_errors: u64,
}

impl PipelineStats {
    /// 현재 값을 읽습니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// 실행 중인 파이프라인 제어 핸들
///
/// 복제해서 어느 스레드/태스크에서든 사용할 수 있습니다.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
}

impl PipelineHandle {
    /// 수신 루프를 멈춥니다.
    ///
    /// 여러 번 호출해도 안전하며 `run` 이전에 호출하면 `run`이 즉시 반환됩니다.
    /// 처리 중인 데이터그램은 끝까지 기록됩니다.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!("pipeline stop requested");
        }
        self.cancel.cancel();
    }

    /// `stop`이 호출되었는지 여부
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 카운터 스냅샷
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// 데이터그램 하나의 처리 결과
#[derive(Debug)]
pub enum ProcessOutcome {
    /// 디코딩 후 기록 완료 (행 수)
    Written(usize),
    /// 디코딩 실패, 행 없음
    DecodeFailed(DecodeError),
    /// 디코딩은 됐지만 싱크 기록 실패
    SinkFailed(SinkError),
}

/// SNMP 트랩 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use trapsink_pipeline::{PipelineConfig, TrapPipelineBuilder};
///
/// let (pipeline, handle) = TrapPipelineBuilder::new()
///     .config(PipelineConfig::from_core(&core_config))
///     .build()?;
///
/// let worker = tokio::spawn(pipeline.run());
/// // ...
/// handle.stop();
/// worker.await??;
/// ```
pub struct TrapPipeline {
    config: PipelineConfig,
    decoder: Box<dyn TrapDecoder>,
    /// `None`이면 수신 루프 시작 시 설정 경로로 [`RotatingCsvSink`]를 엽니다.
    sink: Option<Box<dyn TrapSink>>,
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
}

impl std::fmt::Debug for TrapPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrapPipeline")
            .field("config", &self.config)
            .field("decoder", &self.decoder.name())
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

impl TrapPipeline {
    /// 새 제어 핸들을 반환합니다.
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            cancel: self.cancel.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// 설정된 주소에 UDP 소켓을 바인드합니다.
    ///
    /// 바인드와 수신 루프 시작을 분리할 때 (예: 할당된 포트를 먼저 알아야 할 때)
    /// [`serve`](Self::serve)와 함께 사용합니다. 반환된 future는 `self`를
    /// 빌리지 않으므로 `Send` 태스크 안에서 그대로 await할 수 있습니다.
    pub fn bind(
        &self,
    ) -> impl Future<Output = Result<TrapListener, TrapPipelineError>> + Send + use<> {
        let target = self
            .config
            .socket_addr()
            .map(|addr| (addr, self.config.max_datagram_size));
        async move {
            let (addr, size) = target?;
            TrapListener::bind(addr, size).await
        }
    }

    /// 바인드 후 `stop`까지 수신 루프를 실행합니다.
    ///
    /// 바인드 실패는 처리 시작 전에 반환됩니다.
    /// `stop`이 이미 호출된 상태면 바인드하지 않고 싱크만 닫고 반환합니다.
    pub async fn run(mut self) -> Result<(), TrapPipelineError> {
        if self.cancel.is_cancelled() {
            info!("pipeline stopped before start");
            self.close_sink();
            return Ok(());
        }

        let bind = self.bind();
        let listener = match bind.await {
            Ok(listener) => listener,
            Err(e) => {
                self.close_sink();
                return Err(e);
            }
        };
        self.serve(listener).await
    }

    /// 이미 바인드된 수신기로 `stop`까지 수신 루프를 실행합니다.
    ///
    /// 기본 싱크는 여기서 열리므로 바인드에 실패하면 CSV 파일이 생기지 않습니다.
    pub async fn serve(mut self, mut listener: TrapListener) -> Result<(), TrapPipelineError> {
        if let Err(e) = self.sink_mut().map(|_| ()) {
            error!(csv = %self.config.csv_path.display(), error = %e, "failed to open CSV sink");
            return Err(e.into());
        }

        let local = listener.local_addr().ok();
        info!(
            addr = ?local,
            decoder = self.decoder.name(),
            csv = %self.config.csv_path.display(),
            "trap pipeline running"
        );

        let mut consecutive_errors: u64 = 0;
        loop {
            let datagram = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("trap pipeline received shutdown signal");
                    break;
                }
                result = listener.recv() => result,
            };

            match datagram {
                Ok(datagram) => {
                    if consecutive_errors > 0 {
                        info!(errors = consecutive_errors, "datagram receive recovered");
                        consecutive_errors = 0;
                    }
                    let received_at = SystemTime::now();
                    self.process_datagram(&datagram.payload, datagram.peer, received_at);
                }
                Err(e) => {
                    // 일부 플랫폼은 ICMP port unreachable을 ConnectionReset으로 전달
                    consecutive_errors += 1;
                    PipelineStats::incr(&self.stats.recv_errors, 1);
                    metrics::counter!(m::LISTENER_RECV_ERRORS_TOTAL).increment(1);

                    let delay = recv_backoff(consecutive_errors);
                    if consecutive_errors == 1 || consecutive_errors % RECV_ERROR_LOG_EVERY == 0 {
                        warn!(
                            error = %e,
                            consecutive = consecutive_errors,
                            backoff_ms = delay.as_millis() as u64,
                            "failed to receive datagram"
                        );
                    } else {
                        debug!(error = %e, consecutive = consecutive_errors, "failed to receive datagram");
                    }

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            info!("trap pipeline received shutdown signal");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        drop(listener);
        self.close_sink();
        let stats = self.stats.snapshot();
        info!(
            received = stats.received,
            decoded = stats.decoded,
            decode_errors = stats.decode_errors,
            rows_written = stats.rows_written,
            sink_errors = stats.sink_errors,
            "trap pipeline stopped"
        );
        Ok(())
    }

    /// 데이터그램 하나를 디코딩하고 행을 기록합니다.
    ///
    /// 디코딩/기록 실패는 로그와 카운터로만 남고 전파되지 않습니다.
    pub fn process_datagram(
        &mut self,
        raw: &[u8],
        peer: SocketAddr,
        received_at: SystemTime,
    ) -> ProcessOutcome {
        let started = Instant::now();
        PipelineStats::incr(&self.stats.received, 1);
        metrics::counter!(m::LISTENER_DATAGRAMS_RECEIVED_TOTAL).increment(1);

        let outcome = match self.decoder.decode(raw) {
            Ok(trap) => {
                PipelineStats::incr(&self.stats.decoded, 1);
                metrics::counter!(
                    m::DECODER_TRAPS_DECODED_TOTAL,
                    m::LABEL_VERSION => trap.version.to_string()
                )
                .increment(1);
                debug!(
                    peer = %peer,
                    version = %trap.version,
                    pdu = %trap.pdu,
                    bindings = trap.bindings.len(),
                    "decoded trap"
                );

                let message = TrapMessage::new(peer.to_string(), received_at, trap.bindings);
                let rows = message.rows();
                match self.sink_mut().and_then(|sink| sink.append(&rows)) {
                    Ok(()) => {
                        PipelineStats::incr(&self.stats.rows_written, rows.len() as u64);
                        metrics::counter!(m::SINK_ROWS_WRITTEN_TOTAL).increment(rows.len() as u64);
                        ProcessOutcome::Written(rows.len())
                    }
                    Err(e) => {
                        PipelineStats::incr(&self.stats.sink_errors, 1);
                        metrics::counter!(m::SINK_ERRORS_TOTAL).increment(1);
                        error!(peer = %peer, rows = rows.len(), error = %e, "failed to write trap rows");
                        ProcessOutcome::SinkFailed(e)
                    }
                }
            }
            Err(e) => {
                PipelineStats::incr(&self.stats.decode_errors, 1);
                metrics::counter!(m::DECODER_ERRORS_TOTAL, m::LABEL_DECODE_ERROR => e.kind())
                    .increment(1);
                warn!(peer = %peer, len = raw.len(), kind = e.kind(), error = %e, "dropped undecodable datagram");
                ProcessOutcome::DecodeFailed(e)
            }
        };

        metrics::histogram!(m::LISTENER_PROCESSING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    /// 싱크를 반환하고, 아직 열리지 않았다면 설정 경로로 엽니다.
    fn sink_mut(&mut self) -> Result<&mut Box<dyn TrapSink>, SinkError> {
        if self.sink.is_none() {
            let sink = RotatingCsvSink::open(self.config.csv_path.clone(), self.config.rotation)?;
            self.sink = Some(Box::new(sink));
        }
        self.sink.as_mut().ok_or(SinkError::Closed)
    }

    /// 열린 싱크만 닫습니다. 한 번도 열리지 않았다면 파일을 만들지 않습니다.
    fn close_sink(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.close() {
                error!(error = %e, "failed to close sink");
            }
        }
    }
}

/// 파이프라인 빌더
///
/// 디코더와 싱크를 지정하지 않으면 [`SnmpTrapDecoder`]와
/// 설정의 경로로 연 [`RotatingCsvSink`]가 사용됩니다. 기본 싱크는 소켓 바인드가
/// 끝난 뒤 수신 루프가 시작될 때 열립니다.
#[derive(Default)]
pub struct TrapPipelineBuilder {
    config: Option<PipelineConfig>,
    decoder: Option<Box<dyn TrapDecoder>>,
    sink: Option<Box<dyn TrapSink>>,
    cancel_token: Option<CancellationToken>,
}

impl TrapPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인 설정
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 디코더 교체
    pub fn decoder(mut self, decoder: Box<dyn TrapDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// 싱크 교체
    pub fn sink(mut self, sink: Box<dyn TrapSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 외부 취소 토큰 (상위 종료 신호와 연결할 때)
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// 설정을 검증하고 파이프라인과 제어 핸들을 생성합니다.
    pub fn build(self) -> Result<(TrapPipeline, PipelineHandle), TrapPipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => Box::new(
                SnmpTrapDecoder::new()
                    .with_max_depth(config.max_depth)
                    .with_max_input_size(config.max_input_size),
            ),
        };

        let pipeline = TrapPipeline {
            config,
            decoder,
            sink: self.sink,
            cancel: self.cancel_token.unwrap_or_default(),
            stats: Arc::new(PipelineStats::default()),
        };
        let handle = pipeline.handle();
        Ok((pipeline, handle))
    }
}
