//! 파이프라인 trait -- 디코더/싱크 확장 포인트 정의
//!
//! 리스너는 구체 타입 대신 이 trait에 의존하므로, 테스트나 다른 출력 형식에서
//! 디코더와 싱크를 교체할 수 있습니다.

use crate::error::{DecodeError, SinkError};
use crate::types::{DecodedTrap, TrapRow};

/// 트랩 디코더 trait
///
/// 신뢰할 수 없는 바이트 버퍼를 트랩으로 변환합니다.
/// 어떤 입력에도 패닉하지 않고 에러 값을 반환해야 합니다.
pub trait TrapDecoder: Send + Sync {
    /// 디코더 이름 (로그용)
    fn name(&self) -> &str;

    /// 원시 데이터그램을 디코딩합니다.
    fn decode(&self, raw: &[u8]) -> Result<DecodedTrap, DecodeError>;
}

/// 트랩 행을 영속화하는 싱크 trait
///
/// 단일 워커가 소유하므로 `&mut self`로 append와 로테이션이 직렬화됩니다.
pub trait TrapSink: Send {
    /// 행들을 순서대로 기록하고 flush합니다.
    fn append(&mut self, rows: &[TrapRow]) -> Result<(), SinkError>;

    /// 남은 데이터를 flush하고 파일을 닫습니다.
    fn close(&mut self) -> Result<(), SinkError>;
}
