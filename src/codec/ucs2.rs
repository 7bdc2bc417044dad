//! UCS2 text stored as space-separated decimal bytes.
//!
//! The Windows `XP*` tags hold UTF-16LE text in a `Byte` field, and the
//! byte-level text form of a `Byte` field is a list of decimal numbers:
//! `"test"` is `"116 0 101 0 115 0 116 0"`.

use crate::error::{MetaError, Result};

/// Encode text as UTF-16LE decimal bytes. No terminator is appended.
pub fn to_ucs2(text: &str) -> String {
    text.encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a decimal byte list back to text, dropping trailing NULs.
pub fn from_ucs2(text: &str) -> Result<String> {
    let bytes = text
        .split_whitespace()
        .map(|n| n.parse::<u8>())
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|_| MetaError::invalid_value("UCS2 text", text))?;

    if bytes.len() % 2 != 0 {
        return Err(MetaError::invalid_value("UCS2 text", text));
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let decoded =
        String::from_utf16(&units).map_err(|_| MetaError::invalid_value("UCS2 text", text))?;
    Ok(decoded.trim_end_matches('\0').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_ascii() {
        assert_eq!(to_ucs2("test"), "116 0 101 0 115 0 116 0");
    }

    #[test]
    fn decodes_ascii() {
        assert_eq!(from_ucs2("116 0 101 0 115 0 116 0").unwrap(), "test");
    }

    #[test]
    fn round_trips_non_latin_text() {
        for text in ["", "日本語", "Ölçü", "emoji 🎉"] {
            assert_eq!(from_ucs2(&to_ucs2(text)).unwrap(), text);
        }
    }

    #[test]
    fn trailing_nul_is_dropped() {
        assert_eq!(from_ucs2("104 0 105 0 0 0").unwrap(), "hi");
    }

    #[test]
    fn rejects_garbage() {
        assert!(from_ucs2("104 0 105").is_err());
        assert!(from_ucs2("abc def").is_err());
        assert!(from_ucs2("300 0").is_err());
        // unpaired high surrogate
        assert!(from_ucs2("0 216").is_err());
    }
}
