//! BER TLV 리더
//!
//! SNMP가 사용하는 BER 부분집합만 다룹니다. 태그는 단일 옥텟이고,
//! 길이는 short form(0..=127) 또는 long form(0x81..=0x84)만 허용합니다.
//!
//! 모든 길이는 내용을 읽기 전에 남은 버퍼와 비교됩니다.
//! 오프셋은 항상 원본 데이터그램 기준입니다.

use trapsink_core::error::DecodeError;

pub(crate) const TAG_INTEGER: u8 = 0x02;
pub(crate) const TAG_OCTET_STRING: u8 = 0x04;
pub(crate) const TAG_NULL: u8 = 0x05;
pub(crate) const TAG_OBJECT_IDENTIFIER: u8 = 0x06;
pub(crate) const TAG_SEQUENCE: u8 = 0x30;
pub(crate) const TAG_IP_ADDRESS: u8 = 0x40;
pub(crate) const TAG_COUNTER32: u8 = 0x41;
pub(crate) const TAG_GAUGE32: u8 = 0x42;
pub(crate) const TAG_TIMETICKS: u8 = 0x43;
pub(crate) const TAG_OPAQUE: u8 = 0x44;
pub(crate) const TAG_COUNTER64: u8 = 0x46;

pub(crate) const TAG_TRAP_V1: u8 = 0xa4;
pub(crate) const TAG_INFORM_REQUEST: u8 = 0xa6;
pub(crate) const TAG_TRAP_V2: u8 = 0xa7;

/// long form 길이 옥텟 최대 개수
const MAX_LENGTH_OCTETS: usize = 4;

/// 하나의 TLV 요소
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tlv<'a> {
    pub tag: u8,
    /// 태그 옥텟의 절대 오프셋
    pub offset: usize,
    /// 내용 첫 바이트의 절대 오프셋
    pub content_offset: usize,
    pub content: &'a [u8],
}

/// 경계 검사를 하는 TLV 커서
///
/// 생성된 구조 요소에 들어갈 때마다 [`BerReader::enter`]로 자식 리더를 만들고,
/// 그때 중첩 깊이가 하나 늘어납니다.
#[derive(Debug)]
pub(crate) struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// `data[0]`의 절대 오프셋
    base: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> BerReader<'a> {
    /// 최상위 리더를 생성합니다.
    pub fn new(data: &'a [u8], max_depth: usize) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            depth: 0,
            max_depth,
        }
    }

    /// 현재 위치의 절대 오프셋
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// 다음 TLV를 읽고 커서를 그 뒤로 옮깁니다.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, DecodeError> {
        let offset = self.offset();
        let Some(&tag) = self.data.get(self.pos) else {
            return Err(DecodeError::TruncatedInput {
                offset,
                needed: 1,
                remaining: 0,
            });
        };

        let (length, header_len) = self.read_length(self.pos + 1)?;
        let content_start = self.pos + header_len;
        let available = self.data.len() - content_start;
        if length > available {
            return Err(DecodeError::TruncatedInput {
                offset: self.base + content_start,
                needed: length,
                remaining: available,
            });
        }

        let content = &self.data[content_start..content_start + length];
        self.pos = content_start + length;
        Ok(Tlv {
            tag,
            offset,
            content_offset: self.base + content_start,
            content,
        })
    }

    /// 지정한 태그의 TLV를 읽습니다. 다른 태그면 `MalformedEncoding`
    pub fn expect(&mut self, tag: u8, what: &str) -> Result<Tlv<'a>, DecodeError> {
        let tlv = self.read_tlv()?;
        if tlv.tag != tag {
            return Err(DecodeError::malformed(
                tlv.offset,
                format!(
                    "expected {} (tag 0x{:02x}), found tag 0x{:02x}",
                    what, tag, tlv.tag
                ),
            ));
        }
        Ok(tlv)
    }

    /// 구조 요소 내부를 읽는 자식 리더를 만듭니다.
    pub fn enter(&self, tlv: &Tlv<'a>) -> Result<BerReader<'a>, DecodeError> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(DecodeError::malformed(
                tlv.offset,
                format!("nesting depth exceeds {}", self.max_depth),
            ));
        }
        Ok(BerReader {
            data: tlv.content,
            pos: 0,
            base: tlv.content_offset,
            depth,
            max_depth: self.max_depth,
        })
    }

    /// 구조 요소를 모두 소비했는지 확인합니다.
    pub fn finish(&self, what: &str) -> Result<(), DecodeError> {
        if !self.is_empty() {
            return Err(DecodeError::malformed(
                self.offset(),
                format!("{} trailing bytes inside {}", self.remaining(), what),
            ));
        }
        Ok(())
    }

    /// `pos`에서 길이 필드를 읽어 (길이, 태그 포함 헤더 길이)를 반환합니다.
    fn read_length(&self, pos: usize) -> Result<(usize, usize), DecodeError> {
        let Some(&first) = self.data.get(pos) else {
            return Err(DecodeError::TruncatedInput {
                offset: self.base + pos,
                needed: 1,
                remaining: 0,
            });
        };

        if first < 0x80 {
            return Ok((usize::from(first), 2));
        }
        if first == 0x80 {
            return Err(DecodeError::malformed(
                self.base + pos,
                "indefinite length is not allowed",
            ));
        }

        let octets = usize::from(first & 0x7f);
        if octets > MAX_LENGTH_OCTETS {
            return Err(DecodeError::malformed(
                self.base + pos,
                format!("length uses {} octets (max {})", octets, MAX_LENGTH_OCTETS),
            ));
        }

        let start = pos + 1;
        let available = self.data.len().saturating_sub(start);
        if octets > available {
            return Err(DecodeError::TruncatedInput {
                offset: self.base + start,
                needed: octets,
                remaining: available,
            });
        }

        let length = self.data[start..start + octets]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        Ok((length, 2 + octets))
    }
}
