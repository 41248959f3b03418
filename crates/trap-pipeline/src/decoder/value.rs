//! 변수 바인딩 값 렌더링
//!
//! 태그별로 값을 CSV `value` 열 문자열로 바꿉니다.
//! 알 수 없는 태그는 에러가 아니라 `Unknown` 타입의 hex 값이 됩니다.

use std::fmt::Write as _;

use trapsink_core::error::DecodeError;
use trapsink_core::types::ValueType;

use super::ber::{
    TAG_COUNTER32, TAG_COUNTER64, TAG_GAUGE32, TAG_INTEGER, TAG_IP_ADDRESS, TAG_NULL,
    TAG_OBJECT_IDENTIFIER, TAG_OCTET_STRING, TAG_OPAQUE, TAG_TIMETICKS, Tlv,
};
use super::oid::decode_oid_at;

/// 값 TLV를 (타입, 렌더링 문자열)로 변환합니다.
pub(crate) fn render_value(tlv: &Tlv<'_>) -> Result<(ValueType, String), DecodeError> {
    let content = tlv.content;
    let rendered = match tlv.tag {
        TAG_INTEGER => (ValueType::Integer, decode_integer(tlv)?.to_string()),
        TAG_OCTET_STRING => (ValueType::OctetString, render_octets(content)),
        TAG_OBJECT_IDENTIFIER => (
            ValueType::ObjectIdentifier,
            decode_oid_at(content, tlv.content_offset)?,
        ),
        TAG_IP_ADDRESS => {
            let [a, b, c, d] = content else {
                return Err(DecodeError::malformed(
                    tlv.offset,
                    format!("IpAddress must be 4 octets, found {}", content.len()),
                ));
            };
            (ValueType::IpAddress, format!("{a}.{b}.{c}.{d}"))
        }
        TAG_COUNTER32 => (ValueType::Counter32, decode_unsigned(tlv, 4)?.to_string()),
        TAG_GAUGE32 => (ValueType::Gauge32, decode_unsigned(tlv, 4)?.to_string()),
        TAG_TIMETICKS => (ValueType::TimeTicks, decode_unsigned(tlv, 4)?.to_string()),
        TAG_COUNTER64 => (ValueType::Counter64, decode_unsigned(tlv, 8)?.to_string()),
        TAG_OPAQUE => (ValueType::Opaque, to_hex(content)),
        TAG_NULL => {
            if !content.is_empty() {
                return Err(DecodeError::malformed(
                    tlv.offset,
                    format!("NULL with {} content octets", content.len()),
                ));
            }
            (ValueType::Null, "null".to_owned())
        }
        _ => (ValueType::Unknown, to_hex(content)),
    };
    Ok(rendered)
}

/// 2의 보수 INTEGER (1..=8 옥텟)
pub(crate) fn decode_integer(tlv: &Tlv<'_>) -> Result<i64, DecodeError> {
    let content = tlv.content;
    if content.is_empty() || content.len() > 8 {
        return Err(DecodeError::malformed(
            tlv.offset,
            format!("INTEGER must be 1-8 octets, found {}", content.len()),
        ));
    }

    let init: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(init, |acc, &b| (acc << 8) | i64::from(b)))
}

/// 부호 없는 정수. 유효 옥텟은 `max_octets` 이하이고 앞의 0x00 패딩 한 옥텟은 허용됩니다.
fn decode_unsigned(tlv: &Tlv<'_>, max_octets: usize) -> Result<u64, DecodeError> {
    let content = tlv.content;
    let digits = match content {
        [] => {
            return Err(DecodeError::malformed(tlv.offset, "empty unsigned integer"));
        }
        [0x00, rest @ ..] if content.len() == max_octets + 1 => rest,
        _ if content.len() > max_octets => {
            return Err(DecodeError::malformed(
                tlv.offset,
                format!(
                    "unsigned value of {} octets exceeds {} significant octets",
                    content.len(),
                    max_octets
                ),
            ));
        }
        _ => content,
    };

    Ok(digits
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// 모두 출력 가능한 ASCII면 그대로, 아니면 hex
fn render_octets(content: &[u8]) -> String {
    if content.iter().all(|b| (0x20..=0x7e).contains(b)) {
        // 출력 가능한 ASCII만 있으므로 항상 유효한 UTF-8
        String::from_utf8_lossy(content).into_owned()
    } else {
        to_hex(content)
    }
}

/// 소문자 hex 문자열
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(tag: u8, content: &[u8]) -> Tlv<'_> {
        Tlv {
            tag,
            offset: 0,
            content_offset: 2,
            content,
        }
    }

    fn render(tag: u8, content: &[u8]) -> (ValueType, String) {
        render_value(&tlv(tag, content)).unwrap()
    }

    #[test]
    fn integers_are_twos_complement() {
        assert_eq!(render(TAG_INTEGER, &[0x05]).1, "5");
        assert_eq!(render(TAG_INTEGER, &[0xff]).1, "-1");
        assert_eq!(render(TAG_INTEGER, &[0x00, 0x80]).1, "128");
        assert_eq!(render(TAG_INTEGER, &[0xff, 0x7f]).1, "-129");
        assert_eq!(
            render(TAG_INTEGER, &[0x80, 0, 0, 0, 0, 0, 0, 0]).1,
            i64::MIN.to_string()
        );
    }

    #[test]
    fn integer_width_is_checked() {
        assert!(render_value(&tlv(TAG_INTEGER, &[])).is_err());
        assert!(render_value(&tlv(TAG_INTEGER, &[1; 9])).is_err());
    }

    #[test]
    fn printable_strings_are_kept() {
        assert_eq!(
            render(TAG_OCTET_STRING, b"link down"),
            (ValueType::OctetString, "link down".to_owned())
        );
        assert_eq!(render(TAG_OCTET_STRING, b"").1, "");
    }

    #[test]
    fn binary_strings_are_hex() {
        assert_eq!(render(TAG_OCTET_STRING, &[0x00, 0x1b, 0xff]).1, "001bff");
        // 탭/개행도 출력 가능 범위 밖
        assert_eq!(render(TAG_OCTET_STRING, b"a\nb").1, "610a62");
    }

    #[test]
    fn unsigned_types_render_decimal() {
        assert_eq!(
            render(TAG_TIMETICKS, &[0x30, 0x39]),
            (ValueType::TimeTicks, "12345".to_owned())
        );
        assert_eq!(render(TAG_COUNTER32, &[0x00, 0xff, 0xff, 0xff, 0xff]).1, "4294967295");
        assert_eq!(render(TAG_GAUGE32, &[0x80]).1, "128");
        assert_eq!(
            render(TAG_COUNTER64, &[0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).1,
            u64::MAX.to_string()
        );
    }

    #[test]
    fn unsigned_width_is_checked() {
        assert!(render_value(&tlv(TAG_COUNTER32, &[0x01, 0, 0, 0, 0])).is_err());
        assert!(render_value(&tlv(TAG_COUNTER32, &[0, 0, 0, 0, 0, 0])).is_err());
        assert!(render_value(&tlv(TAG_TIMETICKS, &[])).is_err());
        assert!(render_value(&tlv(TAG_COUNTER64, &[1; 9])).is_err());
    }

    #[test]
    fn ip_address_must_be_four_octets() {
        assert_eq!(
            render(TAG_IP_ADDRESS, &[192, 0, 2, 1]),
            (ValueType::IpAddress, "192.0.2.1".to_owned())
        );
        assert!(render_value(&tlv(TAG_IP_ADDRESS, &[10, 0, 0])).is_err());
    }

    #[test]
    fn null_must_be_empty() {
        assert_eq!(render(TAG_NULL, &[]), (ValueType::Null, "null".to_owned()));
        assert!(render_value(&tlv(TAG_NULL, &[0])).is_err());
    }

    #[test]
    fn opaque_and_unknown_are_hex() {
        assert_eq!(
            render(TAG_OPAQUE, &[0x9f, 0x78, 0x04]),
            (ValueType::Opaque, "9f7804".to_owned())
        );
        assert_eq!(
            render(0x9f, &[0xde, 0xad]),
            (ValueType::Unknown, "dead".to_owned())
        );
        // noSuchInstance (0x81)
        assert_eq!(render(0x81, &[]), (ValueType::Unknown, String::new()));
    }

    #[test]
    fn oid_errors_use_content_offset() {
        let err = render_value(&tlv(TAG_OBJECT_IDENTIFIER, &[])).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEncoding { offset: 2, .. }));
    }
}
