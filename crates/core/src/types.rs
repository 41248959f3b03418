//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 디코더, 싱크, 리스너가 공유하는 데이터 구조를 정의합니다.
//! 수신된 데이터그램 하나가 [`TrapMessage`] 하나가 되고,
//! 바인딩 하나가 CSV 한 행([`TrapRow`])이 됩니다.

use std::fmt;
use std::time::SystemTime;

/// 변수 바인딩 값의 SNMP 타입
///
/// CSV `type` 열에는 [`ValueType::as_str`]의 이름이 그대로 기록됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Counter64,
    Opaque,
    Null,
    /// 인식하지 못한 태그 (값은 원본 바이트의 hex)
    Unknown,
}

impl ValueType {
    /// CSV에 기록되는 타입 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::OctetString => "OctetString",
            Self::ObjectIdentifier => "ObjectIdentifier",
            Self::IpAddress => "IpAddress",
            Self::Counter32 => "Counter32",
            Self::Gauge32 => "Gauge32",
            Self::TimeTicks => "TimeTicks",
            Self::Counter64 => "Counter64",
            Self::Opaque => "Opaque",
            Self::Null => "Null",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 변수 바인딩 (OID, 타입, 문자열 렌더링 값)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    /// 점 표기 OID (예: `1.3.6.1.2.1.1.3.0`)
    pub oid: String,
    /// 값 타입
    pub value_type: ValueType,
    /// 값의 문자열 표현
    pub value: String,
}

impl VariableBinding {
    /// 새 바인딩을 생성합니다.
    pub fn new(oid: impl Into<String>, value_type: ValueType, value: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            value_type,
            value: value.into(),
        }
    }
}

impl fmt::Display for VariableBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}: {}", self.oid, self.value_type, self.value)
    }
}

/// SNMP 메시지 버전
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2c => write!(f, "v2c"),
        }
    }
}

/// 수신 대상 PDU 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapPduKind {
    /// SNMPv1 Trap-PDU (0xA4)
    Trap,
    /// SNMPv2-Trap-PDU (0xA7)
    SnmpV2Trap,
    /// InformRequest-PDU (0xA6). 응답은 보내지 않습니다.
    InformRequest,
}

impl fmt::Display for TrapPduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trap => write!(f, "trap"),
            Self::SnmpV2Trap => write!(f, "snmpv2-trap"),
            Self::InformRequest => write!(f, "inform"),
        }
    }
}

/// 디코딩된 트랩
///
/// 헤더 필드 중 전달에 필요한 값(버전, 커뮤니티, PDU 종류)만 보존합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTrap {
    pub version: SnmpVersion,
    /// 커뮤니티 문자열 (비 UTF-8 바이트는 lossy 변환)
    pub community: String,
    pub pdu: TrapPduKind,
    /// 메시지 내 순서를 유지한 바인딩 목록
    pub bindings: Vec<VariableBinding>,
}

/// 수신된 트랩 메시지
///
/// 데이터그램 하나당 하나 생성되어 즉시 소비됩니다.
#[derive(Debug, Clone)]
pub struct TrapMessage {
    /// 송신자 주소 (`ip:port`)
    pub source_address: String,
    /// 수신 시각 (벽시계)
    pub received_at: SystemTime,
    /// 바인딩 목록
    pub bindings: Vec<VariableBinding>,
}

impl TrapMessage {
    /// 새 트랩 메시지를 생성합니다.
    pub fn new(
        source_address: impl Into<String>,
        received_at: SystemTime,
        bindings: Vec<VariableBinding>,
    ) -> Self {
        Self {
            source_address: source_address.into(),
            received_at,
            bindings,
        }
    }

    /// 바인딩 순서대로 CSV 행을 생성합니다.
    pub fn rows(&self) -> Vec<TrapRow> {
        self.bindings
            .iter()
            .map(|binding| TrapRow {
                timestamp: self.received_at,
                source: self.source_address.clone(),
                oid: binding.oid.clone(),
                value_type: binding.value_type,
                value: binding.value.clone(),
            })
            .collect()
    }
}

/// CSV 데이터 한 행
///
/// 열 순서: `timestamp,source,oid,type,value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapRow {
    pub timestamp: SystemTime,
    pub source: String,
    pub oid: String,
    pub value_type: ValueType,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_names_match_csv_vocabulary() {
        assert_eq!(ValueType::TimeTicks.to_string(), "TimeTicks");
        assert_eq!(ValueType::OctetString.as_str(), "OctetString");
        assert_eq!(ValueType::Unknown.as_str(), "Unknown");
    }

    #[test]
    fn rows_follow_binding_order() {
        let received_at = SystemTime::UNIX_EPOCH;
        let msg = TrapMessage::new(
            "192.0.2.10:40000",
            received_at,
            vec![
                VariableBinding::new("1.3.6.1.2.1.1.3.0", ValueType::TimeTicks, "12345"),
                VariableBinding::new("1.3.6.1.6.3.1.1.4.1.0", ValueType::ObjectIdentifier, "1.3.6.1.4.1.8072.2.3.0.1"),
            ],
        );

        let rows = msg.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].oid, "1.3.6.1.2.1.1.3.0");
        assert_eq!(rows[1].value_type, ValueType::ObjectIdentifier);
        assert!(rows.iter().all(|r| r.source == "192.0.2.10:40000"));
        assert!(rows.iter().all(|r| r.timestamp == received_at));
    }

    #[test]
    fn empty_message_has_no_rows() {
        let msg = TrapMessage::new("192.0.2.10:162", SystemTime::now(), Vec::new());
        assert!(msg.rows().is_empty());
    }

    #[test]
    fn binding_display() {
        let b = VariableBinding::new("1.3.6.1.2.1.1.5.0", ValueType::OctetString, "router-1");
        assert_eq!(b.to_string(), "1.3.6.1.2.1.1.5.0 = OctetString: router-1");
    }
}
