#![no_main]

use libfuzzer_sys::fuzz_target;
use trapsink_core::pipeline::TrapDecoder;
use trapsink_pipeline::SnmpTrapDecoder;

fuzz_target!(|data: &[u8]| {
    let decoder = SnmpTrapDecoder::new();
    if let Ok(trap) = decoder.decode(data) {
        // 성공한 디코딩의 OID는 항상 점 표기
        for binding in &trap.bindings {
            assert!(binding.oid.split('.').all(|arc| arc.parse::<u32>().is_ok()));
        }
    }
});
