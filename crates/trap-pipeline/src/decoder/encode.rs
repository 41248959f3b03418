//! 트랩 데이터그램 인코더
//!
//! 테스트, 벤치마크, 퍼징 시드에서 유효한 v1/v2c 트랩을 만들 때 사용합니다.
//! 디코더와 같은 BER 부분집합만 생성합니다.
//!
//! # 사용 예시
//! ```
//! use trapsink_pipeline::decoder::{TrapEncoder, TrapValue};
//!
//! let datagram = TrapEncoder::v2c("public")
//!     .binding("1.3.6.1.2.1.1.3.0", TrapValue::TimeTicks(12345))
//!     .encode()
//!     .unwrap();
//! assert_eq!(datagram[0], 0x30);
//! ```

use trapsink_core::types::{SnmpVersion, TrapPduKind};

use super::ber::{
    TAG_COUNTER32, TAG_COUNTER64, TAG_GAUGE32, TAG_INFORM_REQUEST, TAG_INTEGER, TAG_IP_ADDRESS,
    TAG_NULL, TAG_OBJECT_IDENTIFIER, TAG_OCTET_STRING, TAG_OPAQUE, TAG_SEQUENCE, TAG_TIMETICKS,
    TAG_TRAP_V1, TAG_TRAP_V2,
};
use super::oid::encode_oid;
use crate::error::TrapPipelineError;

/// 인코딩할 바인딩 값
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Opaque(Vec<u8>),
    Null,
    /// 임의 태그와 내용 (알 수 없는 타입 테스트용)
    Raw { tag: u8, content: Vec<u8> },
}

/// v1/v2c 트랩 인코더
#[derive(Debug, Clone)]
pub struct TrapEncoder {
    version: SnmpVersion,
    community: Vec<u8>,
    pdu: TrapPduKind,
    enterprise: String,
    agent_addr: [u8; 4],
    generic_trap: i64,
    specific_trap: i64,
    timestamp: u32,
    request_id: i64,
    bindings: Vec<(String, TrapValue)>,
}

impl TrapEncoder {
    /// SNMPv1 Trap-PDU 인코더를 생성합니다.
    pub fn v1(community: impl AsRef<[u8]>) -> Self {
        Self {
            version: SnmpVersion::V1,
            community: community.as_ref().to_vec(),
            pdu: TrapPduKind::Trap,
            enterprise: "1.3.6.1.4.1.8072.2.3".to_owned(),
            agent_addr: [127, 0, 0, 1],
            generic_trap: 6,
            specific_trap: 1,
            timestamp: 0,
            request_id: 0,
            bindings: Vec::new(),
        }
    }

    /// SNMPv2-Trap-PDU 인코더를 생성합니다.
    pub fn v2c(community: impl AsRef<[u8]>) -> Self {
        Self {
            version: SnmpVersion::V2c,
            pdu: TrapPduKind::SnmpV2Trap,
            request_id: 1,
            ..Self::v1(community)
        }
    }

    /// PDU를 InformRequest로 바꿉니다 (v2c).
    pub fn inform(mut self) -> Self {
        self.version = SnmpVersion::V2c;
        self.pdu = TrapPduKind::InformRequest;
        self
    }

    /// v1 enterprise OID
    pub fn enterprise(mut self, oid: impl Into<String>) -> Self {
        self.enterprise = oid.into();
        self
    }

    /// v1 agent-addr
    pub fn agent_addr(mut self, addr: [u8; 4]) -> Self {
        self.agent_addr = addr;
        self
    }

    /// v1 generic-trap / specific-trap
    pub fn trap_type(mut self, generic: i64, specific: i64) -> Self {
        self.generic_trap = generic;
        self.specific_trap = specific;
        self
    }

    /// v1 time-stamp
    pub fn timestamp(mut self, ticks: u32) -> Self {
        self.timestamp = ticks;
        self
    }

    /// v2c request-id
    pub fn request_id(mut self, id: i64) -> Self {
        self.request_id = id;
        self
    }

    /// 바인딩을 추가합니다.
    pub fn binding(mut self, oid: impl Into<String>, value: TrapValue) -> Self {
        self.bindings.push((oid.into(), value));
        self
    }

    /// 전체 메시지를 인코딩합니다.
    pub fn encode(&self) -> Result<Vec<u8>, TrapPipelineError> {
        let mut varbinds = Vec::new();
        for (oid, value) in &self.bindings {
            let mut vb = Vec::new();
            write_tlv(&mut vb, TAG_OBJECT_IDENTIFIER, &encode_oid(oid)?);
            encode_value(&mut vb, value)?;
            write_tlv(&mut varbinds, TAG_SEQUENCE, &vb);
        }

        let mut pdu = Vec::new();
        let pdu_tag = match self.pdu {
            TrapPduKind::Trap => {
                write_tlv(&mut pdu, TAG_OBJECT_IDENTIFIER, &encode_oid(&self.enterprise)?);
                write_tlv(&mut pdu, TAG_IP_ADDRESS, &self.agent_addr);
                write_tlv(&mut pdu, TAG_INTEGER, &integer_bytes(self.generic_trap));
                write_tlv(&mut pdu, TAG_INTEGER, &integer_bytes(self.specific_trap));
                write_tlv(&mut pdu, TAG_TIMETICKS, &unsigned_bytes(u64::from(self.timestamp)));
                TAG_TRAP_V1
            }
            TrapPduKind::SnmpV2Trap | TrapPduKind::InformRequest => {
                write_tlv(&mut pdu, TAG_INTEGER, &integer_bytes(self.request_id));
                write_tlv(&mut pdu, TAG_INTEGER, &[0]);
                write_tlv(&mut pdu, TAG_INTEGER, &[0]);
                if self.pdu == TrapPduKind::InformRequest {
                    TAG_INFORM_REQUEST
                } else {
                    TAG_TRAP_V2
                }
            }
        };
        write_tlv(&mut pdu, TAG_SEQUENCE, &varbinds);

        let version = match self.version {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
        };
        let mut message = Vec::new();
        write_tlv(&mut message, TAG_INTEGER, &integer_bytes(version));
        write_tlv(&mut message, TAG_OCTET_STRING, &self.community);
        write_tlv(&mut message, pdu_tag, &pdu);

        let mut out = Vec::with_capacity(message.len() + 4);
        write_tlv(&mut out, TAG_SEQUENCE, &message);
        Ok(out)
    }
}

fn encode_value(out: &mut Vec<u8>, value: &TrapValue) -> Result<(), TrapPipelineError> {
    match value {
        TrapValue::Integer(v) => write_tlv(out, TAG_INTEGER, &integer_bytes(*v)),
        TrapValue::OctetString(bytes) => write_tlv(out, TAG_OCTET_STRING, bytes),
        TrapValue::ObjectIdentifier(oid) => {
            write_tlv(out, TAG_OBJECT_IDENTIFIER, &encode_oid(oid)?)
        }
        TrapValue::IpAddress(addr) => write_tlv(out, TAG_IP_ADDRESS, addr),
        TrapValue::Counter32(v) => write_tlv(out, TAG_COUNTER32, &unsigned_bytes(u64::from(*v))),
        TrapValue::Gauge32(v) => write_tlv(out, TAG_GAUGE32, &unsigned_bytes(u64::from(*v))),
        TrapValue::TimeTicks(v) => write_tlv(out, TAG_TIMETICKS, &unsigned_bytes(u64::from(*v))),
        TrapValue::Counter64(v) => write_tlv(out, TAG_COUNTER64, &unsigned_bytes(*v)),
        TrapValue::Opaque(bytes) => write_tlv(out, TAG_OPAQUE, bytes),
        TrapValue::Null => write_tlv(out, TAG_NULL, &[]),
        TrapValue::Raw { tag, content } => write_tlv(out, *tag, content),
    }
    Ok(())
}

/// TLV를 기록합니다. 길이는 최소 옥텟 수로 인코딩합니다.
pub(crate) fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = (len as u64).to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
}

/// 최소 길이 2의 보수
fn integer_bytes(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// 최소 길이 부호 없는 정수. 최상위 비트가 1이면 0x00 패딩을 붙입니다.
fn unsigned_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|&&b| b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}
