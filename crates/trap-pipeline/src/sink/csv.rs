//! CSV 행 직렬화
//!
//! 쉼표, 큰따옴표, CR, LF가 들어간 필드는 큰따옴표로 감싸고
//! 내부 큰따옴표는 `""`로 이스케이프합니다. 행 구분자는 `\n`입니다.

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use trapsink_core::types::TrapRow;

/// 모든 활성 CSV 파일의 첫 행
pub const CSV_HEADER: &str = "timestamp,source,oid,type,value\n";

/// 수신 시각을 RFC 3339 UTC 초 단위로 렌더링합니다. (예: `2026-10-16T12:00:00Z`)
pub fn format_timestamp(ts: SystemTime) -> String {
    DateTime::<Utc>::from(ts).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 행 하나를 `out` 끝에 추가합니다.
pub(crate) fn write_row(out: &mut String, row: &TrapRow) {
    push_field(out, &format_timestamp(row.timestamp));
    out.push(',');
    push_field(out, &row.source);
    out.push(',');
    push_field(out, &row.oid);
    out.push(',');
    push_field(out, row.value_type.as_str());
    out.push(',');
    push_field(out, &row.value);
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        for ch in field.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}
