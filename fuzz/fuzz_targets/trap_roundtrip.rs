#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use trapsink_core::pipeline::TrapDecoder;
use trapsink_core::types::ValueType;
use trapsink_pipeline::{SnmpTrapDecoder, TrapEncoder, TrapValue};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    v1: bool,
    community: Vec<u8>,
    bindings: Vec<(Vec<u32>, FuzzValue)>,
}

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Integer(i64),
    OctetString(Vec<u8>),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Null,
}

impl FuzzValue {
    fn into_parts(self) -> (TrapValue, ValueType) {
        match self {
            Self::Integer(v) => (TrapValue::Integer(v), ValueType::Integer),
            Self::OctetString(v) => (TrapValue::OctetString(v), ValueType::OctetString),
            Self::IpAddress(v) => (TrapValue::IpAddress(v), ValueType::IpAddress),
            Self::Counter32(v) => (TrapValue::Counter32(v), ValueType::Counter32),
            Self::Gauge32(v) => (TrapValue::Gauge32(v), ValueType::Gauge32),
            Self::TimeTicks(v) => (TrapValue::TimeTicks(v), ValueType::TimeTicks),
            Self::Counter64(v) => (TrapValue::Counter64(v), ValueType::Counter64),
            Self::Null => (TrapValue::Null, ValueType::Null),
        }
    }
}

/// 인코더가 받아들이는 OID로 보정 (첫 arc 0..=2, 두 번째 arc < 40)
fn oid_string(arcs: &[u32]) -> String {
    let first = arcs.first().copied().unwrap_or(1) % 3;
    let second = arcs.get(1).copied().unwrap_or(3) % 40;
    let mut parts = vec![first.to_string(), second.to_string()];
    parts.extend(arcs.iter().skip(2).take(16).map(u32::to_string));
    parts.join(".")
}

fuzz_target!(|input: FuzzInput| {
    let mut encoder = if input.v1 {
        TrapEncoder::v1(&input.community)
    } else {
        TrapEncoder::v2c(&input.community)
    };

    let mut expected = Vec::new();
    for (arcs, value) in input.bindings.into_iter().take(32) {
        let oid = oid_string(&arcs);
        let (value, value_type) = value.into_parts();
        expected.push((oid.clone(), value_type));
        encoder = encoder.binding(oid, value);
    }

    let Ok(raw) = encoder.encode() else {
        return;
    };
    let trap = SnmpTrapDecoder::new()
        .decode(&raw)
        .expect("encoder output must decode");

    assert_eq!(trap.bindings.len(), expected.len());
    for (binding, (oid, value_type)) in trap.bindings.iter().zip(&expected) {
        assert_eq!(&binding.oid, oid);
        assert_eq!(binding.value_type, *value_type);
    }
});
