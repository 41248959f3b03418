//! SNMP 트랩 디코더
//!
//! 신뢰할 수 없는 UDP 데이터그램 하나를 [`DecodedTrap`]으로 변환합니다.
//!
//! # 메시지 구조
//! ```text
//! SEQUENCE {
//!   version   INTEGER (0 = v1, 1 = v2c)
//!   community OCTET STRING
//!   PDU       Trap-PDU (0xA4) | SNMPv2-Trap-PDU (0xA7) | InformRequest-PDU (0xA6)
//! }
//! ```
//!
//! v1 PDU 헤더는 enterprise, agent-addr, generic-trap, specific-trap, time-stamp,
//! v2c PDU 헤더는 request-id, error-status, error-index 입니다.
//! 헤더 필드는 태그만 확인하고 해석하지 않습니다.
//!
//! # 사용 예시
//! ```
//! use trapsink_core::pipeline::TrapDecoder;
//! use trapsink_pipeline::decoder::{SnmpTrapDecoder, TrapEncoder, TrapValue};
//!
//! let raw = TrapEncoder::v1("public")
//!     .binding("1.3.6.1.2.1.1.3.0", TrapValue::TimeTicks(12345))
//!     .encode()
//!     .unwrap();
//! let trap = SnmpTrapDecoder::new().decode(&raw).unwrap();
//! assert_eq!(trap.bindings[0].value, "12345");
//! ```

mod ber;
mod encode;
mod oid;
mod value;

pub use encode::{TrapEncoder, TrapValue};
pub use oid::{decode_oid, encode_oid};

use trapsink_core::error::DecodeError;
use trapsink_core::pipeline::TrapDecoder;
use trapsink_core::types::{DecodedTrap, SnmpVersion, TrapPduKind, VariableBinding};

use crate::config::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_INPUT_SIZE};
use ber::{
    BerReader, TAG_INFORM_REQUEST, TAG_INTEGER, TAG_IP_ADDRESS, TAG_OBJECT_IDENTIFIER,
    TAG_OCTET_STRING, TAG_SEQUENCE, TAG_TIMETICKS, TAG_TRAP_V1, TAG_TRAP_V2,
};

/// SNMP v1/v2c 트랩 디코더
///
/// 상태가 없으므로 여러 태스크에서 공유해도 안전합니다.
/// 중첩 깊이는 명시적 카운터로 제한되며 어떤 입력에도 패닉하지 않습니다.
#[derive(Debug, Clone)]
pub struct SnmpTrapDecoder {
    /// 구조 요소 최대 중첩 깊이
    max_depth: usize,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl SnmpTrapDecoder {
    /// 기본 한도로 새 디코더를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 최대 중첩 깊이를 설정합니다.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    fn decode_message(&self, raw: &[u8]) -> Result<DecodedTrap, DecodeError> {
        if raw.len() > self.max_input_size {
            return Err(DecodeError::malformed(
                0,
                format!(
                    "input of {} bytes exceeds limit of {}",
                    raw.len(),
                    self.max_input_size
                ),
            ));
        }

        // 바깥 SEQUENCE 뒤의 바이트는 무시
        let mut top = BerReader::new(raw, self.max_depth);
        let message = top.expect(TAG_SEQUENCE, "message SEQUENCE")?;
        let mut msg = top.enter(&message)?;

        let version_tlv = msg.expect(TAG_INTEGER, "version")?;
        let version = match value::decode_integer(&version_tlv)? {
            0 => SnmpVersion::V1,
            1 => SnmpVersion::V2c,
            other => return Err(DecodeError::UnsupportedVersion { version: other }),
        };

        let community_tlv = msg.expect(TAG_OCTET_STRING, "community")?;
        let community = String::from_utf8_lossy(community_tlv.content).into_owned();

        let pdu_tlv = msg.read_tlv()?;
        let pdu = match pdu_tlv.tag {
            TAG_TRAP_V1 => TrapPduKind::Trap,
            TAG_TRAP_V2 => TrapPduKind::SnmpV2Trap,
            TAG_INFORM_REQUEST => TrapPduKind::InformRequest,
            tag => return Err(DecodeError::UnsupportedPdu { tag }),
        };
        msg.finish("message")?;

        let mut pdu_reader = msg.enter(&pdu_tlv)?;
        match pdu {
            TrapPduKind::Trap => {
                pdu_reader.expect(TAG_OBJECT_IDENTIFIER, "enterprise")?;
                pdu_reader.expect(TAG_IP_ADDRESS, "agent-addr")?;
                pdu_reader.expect(TAG_INTEGER, "generic-trap")?;
                pdu_reader.expect(TAG_INTEGER, "specific-trap")?;
                pdu_reader.expect(TAG_TIMETICKS, "time-stamp")?;
            }
            TrapPduKind::SnmpV2Trap | TrapPduKind::InformRequest => {
                pdu_reader.expect(TAG_INTEGER, "request-id")?;
                pdu_reader.expect(TAG_INTEGER, "error-status")?;
                pdu_reader.expect(TAG_INTEGER, "error-index")?;
            }
        }

        let list_tlv = pdu_reader.expect(TAG_SEQUENCE, "variable-bindings")?;
        pdu_reader.finish("PDU")?;

        let mut list = pdu_reader.enter(&list_tlv)?;
        let mut bindings = Vec::new();
        while !list.is_empty() {
            let vb_tlv = list.expect(TAG_SEQUENCE, "VarBind")?;
            let mut vb = list.enter(&vb_tlv)?;

            let name = vb.expect(TAG_OBJECT_IDENTIFIER, "VarBind name")?;
            let oid = oid::decode_oid_at(name.content, name.content_offset)?;
            let value_tlv = vb.read_tlv()?;
            vb.finish("VarBind")?;

            let (value_type, value) = value::render_value(&value_tlv)?;
            bindings.push(VariableBinding {
                oid,
                value_type,
                value,
            });
        }

        Ok(DecodedTrap {
            version,
            community,
            pdu,
            bindings,
        })
    }
}

impl Default for SnmpTrapDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrapDecoder for SnmpTrapDecoder {
    fn name(&self) -> &str {
        "snmp"
    }

    fn decode(&self, raw: &[u8]) -> Result<DecodedTrap, DecodeError> {
        self.decode_message(raw)
    }
}
