#![no_main]

use libfuzzer_sys::fuzz_target;
use trapsink_pipeline::{decode_oid, encode_oid};

fuzz_target!(|data: &[u8]| {
    // 디코딩에 성공한 OID는 인코딩 후 다시 디코딩해도 같은 문자열
    if let Ok(oid) = decode_oid(data) {
        if let Ok(encoded) = encode_oid(&oid) {
            assert_eq!(decode_oid(&encoded).ok().as_deref(), Some(oid.as_str()));
        }
    }
});
