//! TIFF field types and their canonical text form.

use super::ifd::ByteOrder;
use crate::error::{MetaError, Result};
use crate::types::TypeName;

/// On-disk TIFF field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Ifd,
    /// A type code outside the TIFF set. Components are taken to be one byte.
    Unknown(u16),
}

impl FieldType {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            13 => FieldType::Ifd,
            other => FieldType::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            FieldType::Byte => 1,
            FieldType::Ascii => 2,
            FieldType::Short => 3,
            FieldType::Long => 4,
            FieldType::Rational => 5,
            FieldType::SByte => 6,
            FieldType::Undefined => 7,
            FieldType::SShort => 8,
            FieldType::SLong => 9,
            FieldType::SRational => 10,
            FieldType::Float => 11,
            FieldType::Double => 12,
            FieldType::Ifd => 13,
            FieldType::Unknown(code) => code,
        }
    }

    /// Size in bytes of one component.
    pub fn size(self) -> usize {
        match self {
            FieldType::Byte
            | FieldType::Ascii
            | FieldType::SByte
            | FieldType::Undefined
            | FieldType::Unknown(_) => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational | FieldType::SRational | FieldType::Double => 8,
        }
    }

    pub fn type_name(self) -> TypeName {
        match self {
            FieldType::Byte => TypeName::Byte,
            FieldType::Ascii => TypeName::Ascii,
            FieldType::Short => TypeName::Short,
            FieldType::Long => TypeName::Long,
            FieldType::Rational => TypeName::Rational,
            FieldType::SByte => TypeName::SByte,
            FieldType::Undefined | FieldType::Unknown(_) => TypeName::Undefined,
            FieldType::SShort => TypeName::SShort,
            FieldType::SLong => TypeName::SLong,
            FieldType::SRational => TypeName::SRational,
            FieldType::Float => TypeName::Float,
            FieldType::Double => TypeName::Double,
            FieldType::Ifd => TypeName::Ifd,
        }
    }

    /// Field type used to store values of `type_name`. `Comment` is stored
    /// as `Undefined`.
    pub fn from_type_name(type_name: TypeName) -> Option<Self> {
        let ft = match type_name {
            TypeName::Byte => FieldType::Byte,
            TypeName::Ascii => FieldType::Ascii,
            TypeName::Short => FieldType::Short,
            TypeName::Long => FieldType::Long,
            TypeName::Rational => FieldType::Rational,
            TypeName::SByte => FieldType::SByte,
            TypeName::Undefined | TypeName::Comment => FieldType::Undefined,
            TypeName::SShort => FieldType::SShort,
            TypeName::SLong => FieldType::SLong,
            TypeName::SRational => FieldType::SRational,
            TypeName::Float => FieldType::Float,
            TypeName::Double => FieldType::Double,
            TypeName::Ifd => FieldType::Ifd,
            _ => return None,
        };
        Some(ft)
    }
}

/// Render a field's raw bytes as text.
pub fn to_text(field_type: FieldType, data: &[u8], order: ByteOrder) -> String {
    let join = |parts: Vec<String>| parts.join(" ");
    match field_type {
        FieldType::Ascii => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            String::from_utf8_lossy(&data[..end]).into_owned()
        }
        FieldType::Byte | FieldType::Undefined | FieldType::Unknown(_) => {
            join(data.iter().map(|b| b.to_string()).collect())
        }
        FieldType::SByte => join(data.iter().map(|&b| (b as i8).to_string()).collect()),
        FieldType::Short => join(
            data.chunks_exact(2)
                .map(|c| order.u16_from([c[0], c[1]]).to_string())
                .collect(),
        ),
        FieldType::SShort => join(
            data.chunks_exact(2)
                .map(|c| (order.u16_from([c[0], c[1]]) as i16).to_string())
                .collect(),
        ),
        FieldType::Long | FieldType::Ifd => join(
            data.chunks_exact(4)
                .map(|c| order.u32_from([c[0], c[1], c[2], c[3]]).to_string())
                .collect(),
        ),
        FieldType::SLong => join(
            data.chunks_exact(4)
                .map(|c| (order.u32_from([c[0], c[1], c[2], c[3]]) as i32).to_string())
                .collect(),
        ),
        FieldType::Rational => join(
            data.chunks_exact(8)
                .map(|c| {
                    let n = order.u32_from([c[0], c[1], c[2], c[3]]);
                    let d = order.u32_from([c[4], c[5], c[6], c[7]]);
                    format!("{n}/{d}")
                })
                .collect(),
        ),
        FieldType::SRational => join(
            data.chunks_exact(8)
                .map(|c| {
                    let n = order.u32_from([c[0], c[1], c[2], c[3]]) as i32;
                    let d = order.u32_from([c[4], c[5], c[6], c[7]]) as i32;
                    format!("{n}/{d}")
                })
                .collect(),
        ),
        FieldType::Float => join(
            data.chunks_exact(4)
                .map(|c| f32::from_bits(order.u32_from([c[0], c[1], c[2], c[3]])).to_string())
                .collect(),
        ),
        FieldType::Double => join(
            data.chunks_exact(8)
                .map(|c| {
                    let bytes = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                    f64::from_bits(order.u64_from(bytes)).to_string()
                })
                .collect(),
        ),
    }
}

/// Encoded field: type, component count and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub field_type: FieldType,
    pub count: u32,
    pub data: Vec<u8>,
}

/// Parse the text form of a value of `type_name` into raw field bytes.
pub fn from_text(key: &str, type_name: TypeName, text: &str, order: ByteOrder) -> Result<Encoded> {
    let field_type = FieldType::from_type_name(type_name).ok_or_else(|| {
        MetaError::unsupported_type(key, "an EXIF field type", type_name.as_str())
    })?;
    let invalid = || MetaError::invalid_value(key, text);

    let data: Vec<u8> = if type_name == TypeName::Comment {
        encode_comment(text, order)
    } else {
        match field_type {
            FieldType::Ascii => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            FieldType::Byte | FieldType::Undefined | FieldType::Unknown(_) => {
                parse_all::<u8>(text).ok_or_else(invalid)?
            }
            FieldType::SByte => parse_all::<i8>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .map(|v| v as u8)
                .collect(),
            FieldType::Short => parse_all::<u16>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .flat_map(|v| order.u16_bytes(v))
                .collect(),
            FieldType::SShort => parse_all::<i16>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .flat_map(|v| order.u16_bytes(v as u16))
                .collect(),
            FieldType::Long | FieldType::Ifd => parse_all::<u32>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .flat_map(|v| order.u32_bytes(v))
                .collect(),
            FieldType::SLong => parse_all::<i32>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .flat_map(|v| order.u32_bytes(v as u32))
                .collect(),
            FieldType::Rational => {
                let mut out = Vec::new();
                for part in text.split_whitespace() {
                    let (n, d) = parse_ratio::<u32>(part).ok_or_else(invalid)?;
                    out.extend(order.u32_bytes(n));
                    out.extend(order.u32_bytes(d));
                }
                out
            }
            FieldType::SRational => {
                let mut out = Vec::new();
                for part in text.split_whitespace() {
                    let (n, d) = parse_ratio::<i32>(part).ok_or_else(invalid)?;
                    out.extend(order.u32_bytes(n as u32));
                    out.extend(order.u32_bytes(d as u32));
                }
                out
            }
            FieldType::Float => parse_all::<f32>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .flat_map(|v| order.u32_bytes(v.to_bits()))
                .collect(),
            FieldType::Double => parse_all::<f64>(text)
                .ok_or_else(invalid)?
                .into_iter()
                .flat_map(|v| order.u64_bytes(v.to_bits()))
                .collect(),
        }
    };

    let count = u32::try_from(data.len() / field_type.size()).map_err(|_| invalid())?;
    Ok(Encoded {
        field_type,
        count,
        data,
    })
}

fn parse_all<T: std::str::FromStr>(text: &str) -> Option<Vec<T>> {
    text.split_whitespace().map(|p| p.parse().ok()).collect()
}

/// `n/d`, or a bare integer meaning `n/1`.
fn parse_ratio<T: std::str::FromStr + From<u8>>(part: &str) -> Option<(T, T)> {
    match part.split_once('/') {
        Some((n, d)) => Some((n.parse().ok()?, d.parse().ok()?)),
        None => Some((part.parse().ok()?, T::from(1))),
    }
}

// ── UserComment ─────────────────────────────────────────────────────

const CHARSET_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const CHARSET_UNICODE: &[u8; 8] = b"UNICODE\0";
const CHARSET_JIS: &[u8; 8] = b"JIS\0\0\0\0\0";
const CHARSET_UNDEFINED: &[u8; 8] = &[0; 8];

/// Decode a comment field: an 8-byte charset header followed by text.
pub fn decode_comment(data: &[u8], order: ByteOrder) -> String {
    if data.len() < 8 {
        return String::from_utf8_lossy(data).trim_end_matches('\0').to_string();
    }
    let (header, body) = data.split_at(8);
    let text = if header == CHARSET_UNICODE {
        decode_utf16(body, order)
    } else if header == CHARSET_ASCII || header == CHARSET_JIS || header == CHARSET_UNDEFINED {
        String::from_utf8_lossy(body).into_owned()
    } else {
        String::from_utf8_lossy(data).into_owned()
    };
    text.trim_end_matches('\0').to_string()
}

fn decode_utf16(body: &[u8], order: ByteOrder) -> String {
    let (order, body) = match body {
        [0xFF, 0xFE, rest @ ..] => (ByteOrder::Little, rest),
        [0xFE, 0xFF, rest @ ..] => (ByteOrder::Big, rest),
        _ => (order, body),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| order.u16_from([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Encode a comment. An optional `charset=Ascii|Unicode|Jis|Undefined `
/// prefix (the name may be quoted) selects the header; otherwise ASCII text
/// gets the ASCII header and anything else UNICODE.
pub fn encode_comment(text: &str, order: ByteOrder) -> Vec<u8> {
    let (charset, body) = split_charset(text);
    let charset = charset.unwrap_or(if body.is_ascii() { "ascii" } else { "unicode" });

    let mut out = Vec::with_capacity(8 + body.len() * 2);
    match charset {
        "unicode" => {
            out.extend_from_slice(CHARSET_UNICODE);
            out.extend(body.encode_utf16().flat_map(|u| order.u16_bytes(u)));
        }
        "jis" => {
            out.extend_from_slice(CHARSET_JIS);
            out.extend_from_slice(body.as_bytes());
        }
        "undefined" => {
            out.extend_from_slice(CHARSET_UNDEFINED);
            out.extend_from_slice(body.as_bytes());
        }
        _ => {
            out.extend_from_slice(CHARSET_ASCII);
            out.extend_from_slice(body.as_bytes());
        }
    }
    out
}

fn split_charset(text: &str) -> (Option<&'static str>, &str) {
    let Some(rest) = text.strip_prefix("charset=") else {
        return (None, text);
    };
    let (name, body) = rest.split_once(' ').unwrap_or((rest, ""));
    let charset = match name.trim_matches('"').to_ascii_lowercase().as_str() {
        "ascii" => "ascii",
        "unicode" => "unicode",
        "jis" => "jis",
        "undefined" => "undefined",
        _ => return (None, text),
    };
    (Some(charset), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LE: ByteOrder = ByteOrder::Little;
    const BE: ByteOrder = ByteOrder::Big;

    fn text_of(type_name: TypeName, text: &str, order: ByteOrder) -> String {
        let enc = from_text("Exif.Test.Tag", type_name, text, order).unwrap();
        to_text(enc.field_type, &enc.data, order)
    }

    // ── Numeric ──────────────────────────────────────────────────────

    #[test]
    fn integers_and_lists() {
        assert_eq!(text_of(TypeName::Short, "1 2 65535", BE), "1 2 65535");
        assert_eq!(text_of(TypeName::SLong, "-5 7", LE), "-5 7");
        assert_eq!(text_of(TypeName::Byte, "0 255", LE), "0 255");
    }

    #[test]
    fn rationals_keep_fraction_form() {
        assert_eq!(text_of(TypeName::Rational, "72/1 300/1", LE), "72/1 300/1");
        assert_eq!(text_of(TypeName::Rational, "5", LE), "5/1");
        assert_eq!(text_of(TypeName::SRational, "-1/3", BE), "-1/3");
    }

    #[test]
    fn floats_round_trip() {
        assert_eq!(text_of(TypeName::Float, "0.1", LE), "0.1");
        assert_eq!(text_of(TypeName::Double, "2.5 -1", BE), "2.5 -1");
    }

    #[test]
    fn counts_follow_component_size() {
        let enc = from_text("k", TypeName::Rational, "1/2 3/4", LE).unwrap();
        assert_eq!(enc.count, 2);
        assert_eq!(enc.data.len(), 16);

        let enc = from_text("k", TypeName::Ascii, "Canon", LE).unwrap();
        assert_eq!(enc.count, 6);
        assert_eq!(enc.data.last(), Some(&0));
    }

    #[test]
    fn unparseable_numbers_are_invalid() {
        let err = from_text("Exif.Image.Orientation", TypeName::Short, "top", LE).unwrap_err();
        assert!(matches!(err, MetaError::InvalidValue { .. }));
        assert!(from_text("k", TypeName::Byte, "256", LE).is_err());
        assert!(from_text("k", TypeName::Rational, "1/x", LE).is_err());
    }

    #[test]
    fn non_exif_type_is_rejected() {
        let err = from_text("k", TypeName::XmpBag, "a", LE).unwrap_err();
        assert!(matches!(err, MetaError::UnsupportedType { .. }));
    }

    // ── Ascii ────────────────────────────────────────────────────────

    #[test]
    fn ascii_stops_at_nul() {
        assert_eq!(to_text(FieldType::Ascii, b"abc\0def", LE), "abc");
        assert_eq!(to_text(FieldType::Ascii, b"abc", LE), "abc");
    }

    // ── Unknown types ────────────────────────────────────────────────

    #[test]
    fn unknown_code_keeps_its_number() {
        let ft = FieldType::from_code(99);
        assert_eq!(ft, FieldType::Unknown(99));
        assert_eq!(ft.code(), 99);
        assert_eq!(ft.size(), 1);
        assert_eq!(ft.type_name(), TypeName::Undefined);
        assert_eq!(to_text(ft, &[1, 2, 3], LE), "1 2 3");
        assert_eq!(FieldType::from_code(7), FieldType::Undefined);
    }

    // ── UserComment ──────────────────────────────────────────────────

    #[test]
    fn comment_ascii_header() {
        let data = encode_comment("hello", LE);
        assert_eq!(&data[..8], b"ASCII\0\0\0");
        assert_eq!(decode_comment(&data, LE), "hello");
    }

    #[test]
    fn comment_unicode_in_both_orders() {
        for order in [LE, BE] {
            let data = encode_comment("héllo", order);
            assert_eq!(&data[..8], b"UNICODE\0");
            assert_eq!(decode_comment(&data, order), "héllo");
        }
    }

    #[test]
    fn comment_charset_prefix() {
        let data = encode_comment("charset=\"Unicode\" abc", LE);
        assert_eq!(&data[..8], b"UNICODE\0");
        assert_eq!(decode_comment(&data, LE), "abc");

        let data = encode_comment("charset=Jis xyz", LE);
        assert_eq!(&data[..8], b"JIS\0\0\0\0\0");
        assert_eq!(decode_comment(&data, LE), "xyz");
    }

    #[test]
    fn comment_trailing_nuls_trimmed() {
        let mut data = CHARSET_ASCII.to_vec();
        data.extend_from_slice(b"pad\0\0\0");
        assert_eq!(decode_comment(&data, LE), "pad");
    }
}
