/// geosite.dat / geoip.dat 的最小 protobuf 解码
///
/// 两个文件的外层都是 `repeated Entry entries = 1;`，
/// 每个 Entry 的第 1 个字段是 tag（geosite）或 country_code（geoip）。
/// 只解析这两层，其余字段按 wire type 跳过。
///
/// 所有读取函数都是纯函数：输入缓冲区和当前偏移，返回值和新的偏移。
use std::collections::BTreeSet;

use crate::common::DecodeError;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// 解析外层列表，返回小写、去重、升序的 tag 列表
pub fn parse_geo_tags(buf: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut tags = BTreeSet::new();
    let mut pos = 0;
    while pos < buf.len() {
        let (field, wire_type, next) = read_key(buf, pos)?;
        pos = next;
        if field == 1 && wire_type == WIRE_LEN {
            let (entry, next) = read_len_delimited(buf, pos)?;
            pos = next;
            if let Some(tag) = first_string_field(entry)? {
                if !tag.is_empty() {
                    tags.insert(tag.to_lowercase());
                }
            }
        } else {
            pos = skip_field(buf, pos, wire_type)?;
        }
    }
    Ok(tags.into_iter().collect())
}

/// 在一个 Entry 内找到第一个 field 1 的字符串
fn first_string_field(entry: &[u8]) -> Result<Option<String>, DecodeError> {
    let mut pos = 0;
    while pos < entry.len() {
        let (field, wire_type, next) = read_key(entry, pos)?;
        pos = next;
        if field == 1 && wire_type == WIRE_LEN {
            let (bytes, _) = read_len_delimited(entry, pos)?;
            return Ok(Some(String::from_utf8_lossy(bytes).into_owned()));
        }
        pos = skip_field(entry, pos, wire_type)?;
    }
    Ok(None)
}

/// 读取字段键，拆成 (field number, wire type)
fn read_key(buf: &[u8], pos: usize) -> Result<(u64, u8, usize), DecodeError> {
    let (key, next) = read_varint(buf, pos)?;
    Ok((key >> 3, (key & 0x7) as u8, next))
}

/// 读取 base-128 varint，超过 64 位报错
pub(crate) fn read_varint(buf: &[u8], pos: usize) -> Result<(u64, usize), DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut i = pos;
    loop {
        let b = *buf
            .get(i)
            .ok_or(DecodeError::Truncated { offset: i, needed: 1 })?;
        // 第 10 个字节只能贡献最高位
        if shift == 63 && b > 1 {
            return Err(DecodeError::VarintOverflow { offset: pos });
        }
        result |= ((b & 0x7F) as u64) << shift;
        i += 1;
        if b & 0x80 == 0 {
            return Ok((result, i));
        }
        shift += 7;
        if shift >= 64 {
            return Err(DecodeError::VarintOverflow { offset: pos });
        }
    }
}

/// 读取长度前缀的字节段，返回借用的切片
fn read_len_delimited(buf: &[u8], pos: usize) -> Result<(&[u8], usize), DecodeError> {
    let (len, start) = read_varint(buf, pos)?;
    let end = take(buf, start, len)?;
    Ok((&buf[start..end], end))
}

/// 检查从 `pos` 开始还剩 `len` 字节，返回结束偏移
fn take(buf: &[u8], pos: usize, len: u64) -> Result<usize, DecodeError> {
    let remaining = buf.len().saturating_sub(pos);
    match usize::try_from(len) {
        Ok(n) if n <= remaining => Ok(pos + n),
        Ok(n) => Err(DecodeError::Truncated {
            offset: pos,
            needed: n - remaining,
        }),
        Err(_) => Err(DecodeError::Truncated {
            offset: pos,
            needed: usize::MAX,
        }),
    }
}

fn skip_field(buf: &[u8], pos: usize, wire_type: u8) -> Result<usize, DecodeError> {
    match wire_type {
        WIRE_VARINT => read_varint(buf, pos).map(|(_, next)| next),
        WIRE_FIXED64 => take(buf, pos, 8),
        WIRE_LEN => read_len_delimited(buf, pos).map(|(_, next)| next),
        WIRE_FIXED32 => take(buf, pos, 4),
        other => Err(DecodeError::UnknownWireType {
            wire_type: other,
            offset: pos,
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 编码 varint
    pub(crate) fn encode_varint(mut val: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        while val >= 0x80 {
            buf.push((val as u8) | 0x80);
            val >>= 7;
        }
        buf.push(val as u8);
        buf
    }

    /// 编码一个长度前缀字段
    pub(crate) fn encode_len_field(field: u64, payload: &[u8]) -> Vec<u8> {
        let mut buf = encode_varint((field << 3) | WIRE_LEN as u64);
        buf.extend(encode_varint(payload.len() as u64));
        buf.extend_from_slice(payload);
        buf
    }

    /// 构造一个外层列表：每个 Entry 只有 field 1 字符串，外加一个 field 2 子消息
    pub(crate) fn encode_geo_list(tags: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for tag in tags {
            let mut entry = encode_len_field(1, tag.as_bytes());
            entry.extend(encode_len_field(2, b"\x08\x01\x12\x03abc"));
            out.extend(encode_len_field(1, &entry));
        }
        out
    }

    #[test]
    fn test_varint_values() {
        for v in [0u64, 1, 127, 128, 300, 100_000, u32::MAX as u64, u64::MAX] {
            let encoded = encode_varint(v);
            let (decoded, next) = read_varint(&encoded, 0).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(next, encoded.len());
        }
    }

    #[test]
    fn test_varint_overflow() {
        let too_long = [0xFFu8; 11];
        assert_eq!(
            read_varint(&too_long, 0),
            Err(DecodeError::VarintOverflow { offset: 0 })
        );
        // 第 10 字节大于 1 同样溢出
        let mut tenth = vec![0xFFu8; 9];
        tenth.push(0x02);
        assert!(matches!(
            read_varint(&tenth, 0),
            Err(DecodeError::VarintOverflow { .. })
        ));
    }

    #[test]
    fn test_case_fold_dedup_sort() {
        let buf = encode_geo_list(&["CN", "cn", "US"]);
        assert_eq!(parse_geo_tags(&buf).unwrap(), vec!["cn", "us"]);
    }

    #[test]
    fn test_empty_buffer() {
        assert!(parse_geo_tags(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_skips_other_wire_types() {
        let mut buf = Vec::new();
        // field 2 varint
        buf.extend(encode_varint((2 << 3) | WIRE_VARINT as u64));
        buf.extend(encode_varint(300));
        // field 3 fixed64
        buf.extend(encode_varint((3 << 3) | WIRE_FIXED64 as u64));
        buf.extend_from_slice(&[0; 8]);
        // field 4 fixed32
        buf.extend(encode_varint((4 << 3) | WIRE_FIXED32 as u64));
        buf.extend_from_slice(&[0; 4]);
        // field 5 bytes
        buf.extend(encode_len_field(5, b"ignored"));
        buf.extend(encode_geo_list(&["Private"]));

        assert_eq!(parse_geo_tags(&buf).unwrap(), vec!["private"]);
    }

    #[test]
    fn test_entry_field_order() {
        // tag 字段排在其他字段之后也能找到
        let mut entry = encode_varint((3 << 3) | WIRE_VARINT as u64);
        entry.push(7);
        entry.extend(encode_len_field(1, b"google"));
        entry.extend(encode_len_field(1, b"second"));
        let buf = encode_len_field(1, &entry);
        assert_eq!(parse_geo_tags(&buf).unwrap(), vec!["google"]);
    }

    #[test]
    fn test_entry_without_tag_is_ignored() {
        let entry = encode_len_field(2, b"no tag here");
        let mut buf = encode_len_field(1, &entry);
        buf.extend(encode_len_field(1, &encode_len_field(1, b"")));
        buf.extend(encode_geo_list(&["jp"]));
        assert_eq!(parse_geo_tags(&buf).unwrap(), vec!["jp"]);
    }

    #[test]
    fn test_truncated_length() {
        let mut buf = encode_geo_list(&["cn"]);
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            parse_geo_tags(&buf),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_truncated_fixed64() {
        let mut buf = encode_varint((2 << 3) | WIRE_FIXED64 as u64);
        buf.extend_from_slice(&[0; 3]);
        assert_eq!(
            parse_geo_tags(&buf),
            Err(DecodeError::Truncated {
                offset: 1,
                needed: 5
            })
        );
    }

    #[test]
    fn test_unknown_wire_type() {
        // field 1，wire type 3（已废弃的 start group）
        let buf = [(1 << 3) | 3];
        assert_eq!(
            parse_geo_tags(&buf),
            Err(DecodeError::UnknownWireType {
                wire_type: 3,
                offset: 1
            })
        );
    }

    #[test]
    fn test_huge_length_is_truncated_not_panic() {
        let mut buf = encode_varint((1 << 3) | WIRE_LEN as u64);
        buf.extend(encode_varint(u64::MAX));
        assert!(matches!(
            parse_geo_tags(&buf),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
