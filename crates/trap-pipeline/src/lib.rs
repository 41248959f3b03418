#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`decoder`]: 신뢰할 수 없는 데이터그램을 트랩으로 변환하는 BER 디코더
//! - [`sink`]: 크기/기간 기반 로테이션 CSV 싱크
//! - [`listener`]: UDP 수신기
//! - [`pipeline`]: 수신 루프와 제어 핸들
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod decoder;
pub mod error;
pub mod listener;
pub mod pipeline;
pub mod sink;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{
    PipelineHandle, PipelineStats, ProcessOutcome, StatsSnapshot, TrapPipeline,
    TrapPipelineBuilder,
};

// 설정
pub use config::{PipelineConfig, RotationPolicy};

// 에러
pub use error::TrapPipelineError;

// 디코더
pub use decoder::{SnmpTrapDecoder, TrapEncoder, TrapValue, decode_oid, encode_oid};

// 싱크
pub use sink::{CSV_HEADER, Clock, RotatingCsvSink, SinkState, format_timestamp};

// 수신기
pub use listener::{Datagram, TrapListener};
