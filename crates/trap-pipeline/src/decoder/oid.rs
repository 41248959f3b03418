//! OBJECT IDENTIFIER 인코딩/디코딩
//!
//! 각 서브식별자는 base-128로 인코딩되며 마지막 옥텟을 제외하고 최상위 비트가 1입니다.
//! 첫 옥텟은 처음 두 아크를 `40 * X + Y`로 합친 값입니다.

use std::fmt::Write as _;

use trapsink_core::error::DecodeError;

use crate::error::TrapPipelineError;

/// BER 내용 옥텟을 점 표기 OID로 디코딩합니다.
///
/// 에러 오프셋은 `content` 기준입니다.
pub fn decode_oid(content: &[u8]) -> Result<String, DecodeError> {
    decode_oid_at(content, 0)
}

/// `base`를 내용 시작 오프셋으로 삼아 디코딩합니다.
pub(crate) fn decode_oid_at(content: &[u8], base: usize) -> Result<String, DecodeError> {
    if content.is_empty() {
        return Err(DecodeError::malformed(base, "empty OBJECT IDENTIFIER"));
    }

    let mut out = String::with_capacity(content.len() * 4);
    let mut value: u64 = 0;
    let mut first = true;

    for (i, &byte) in content.iter().enumerate() {
        value = (value << 7) | u64::from(byte & 0x7f);
        if value > u64::from(u32::MAX) {
            return Err(DecodeError::malformed(
                base + i,
                "OID sub-identifier exceeds 32 bits",
            ));
        }
        if byte & 0x80 != 0 {
            continue;
        }

        if first {
            let (x, y) = match value {
                0..40 => (0, value),
                40..80 => (1, value - 40),
                _ => (2, value - 80),
            };
            let _ = write!(out, "{}.{}", x, y);
            first = false;
        } else {
            let _ = write!(out, ".{}", value);
        }
        value = 0;
    }

    if content.last().is_some_and(|b| b & 0x80 != 0) {
        return Err(DecodeError::malformed(
            base + content.len() - 1,
            "OID ends inside a sub-identifier",
        ));
    }

    Ok(out)
}

/// 점 표기 OID를 BER 내용 옥텟으로 인코딩합니다.
pub fn encode_oid(oid: &str) -> Result<Vec<u8>, TrapPipelineError> {
    let invalid = |reason: &str| TrapPipelineError::InvalidOid {
        oid: oid.to_owned(),
        reason: reason.to_owned(),
    };

    let arcs = oid
        .split('.')
        .map(|arc| arc.parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|_| invalid("arcs must be decimal numbers between 0 and 4294967295"))?;

    let [x, y, rest @ ..] = arcs.as_slice() else {
        return Err(invalid("at least two arcs are required"));
    };
    if *x > 2 {
        return Err(invalid("first arc must be 0, 1 or 2"));
    }
    if *x < 2 && *y >= 40 {
        return Err(invalid("second arc must be below 40 when first arc is 0 or 1"));
    }
    let combined = (*x * 40)
        .checked_add(*y)
        .ok_or_else(|| invalid("first two arcs overflow 32 bits"))?;

    let mut out = Vec::with_capacity(arcs.len() * 2);
    push_base128(&mut out, combined);
    for &arc in rest {
        push_base128(&mut out, arc);
    }
    Ok(out)
}

fn push_base128(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut v = value;
    loop {
        groups[n] = (v & 0x7f) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_sys_uptime() {
        let bytes = [0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x03, 0x00];
        assert_eq!(decode_oid(&bytes).unwrap(), "1.3.6.1.2.1.1.3.0");
    }

    #[test]
    fn decodes_multi_octet_arcs() {
        // 1.3.6.1.4.1.8072 -> 8072 = 0xbf 0x08
        let bytes = [0x2b, 0x06, 0x01, 0x04, 0x01, 0xbf, 0x08];
        assert_eq!(decode_oid(&bytes).unwrap(), "1.3.6.1.4.1.8072");
    }

    #[test]
    fn decodes_joint_iso_itu_root() {
        // 2.999 -> 1079 = 0x88 0x37
        assert_eq!(decode_oid(&[0x88, 0x37]).unwrap(), "2.999");
    }

    #[test]
    fn rejects_empty_oid() {
        assert!(decode_oid(&[]).is_err());
    }

    #[test]
    fn rejects_trailing_continuation() {
        let err = decode_oid(&[0x2b, 0x06, 0x81]).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEncoding { offset: 2, .. }));
    }

    #[test]
    fn rejects_arc_overflow() {
        let bytes = [0x2b, 0x90, 0x80, 0x80, 0x80, 0x00];
        assert!(decode_oid(&bytes).is_err());
    }

    #[test]
    fn offsets_are_shifted_by_base() {
        let err = decode_oid_at(&[], 17).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEncoding { offset: 17, .. }));
    }

    #[test]
    fn encodes_known_oid() {
        assert_eq!(
            encode_oid("1.3.6.1.4.1.8072").unwrap(),
            vec![0x2b, 0x06, 0x01, 0x04, 0x01, 0xbf, 0x08]
        );
    }

    #[test]
    fn encode_rejects_bad_input() {
        assert!(encode_oid("").is_err());
        assert!(encode_oid("1").is_err());
        assert!(encode_oid("3.1").is_err());
        assert!(encode_oid("1.40").is_err());
        assert!(encode_oid("1.3.six").is_err());
        assert!(encode_oid("1.3.4294967296").is_err());
    }

    fn oid_strategy() -> impl Strategy<Value = String> {
        let head = (0u32..=2).prop_flat_map(|x| {
            let y = if x < 2 { 0u32..40 } else { 0u32..(u32::MAX - 80) };
            (Just(x), y)
        });
        (head, prop::collection::vec(any::<u32>(), 0..16)).prop_map(|((x, y), rest)| {
            let mut s = format!("{}.{}", x, y);
            for arc in rest {
                s.push('.');
                s.push_str(&arc.to_string());
            }
            s
        })
    }

    proptest! {
        #[test]
        fn oid_round_trips(oid in oid_strategy()) {
            let encoded = encode_oid(&oid).unwrap();
            prop_assert_eq!(decode_oid(&encoded).unwrap(), oid);
        }

        #[test]
        fn decode_arbitrary_bytes_does_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_oid(&bytes);
        }
    }
}
