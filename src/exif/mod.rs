//! EXIF metadata: TIFF image file directories.
//!
//! - [`decode`]: TIFF block → tag table (`Exif.<Group>.<Name>` keys)
//! - [`encode`]: tag table → compact TIFF block in the original byte order
//!
//! The windows `XP*` tags are exposed as plain text and stored as UTF-16LE
//! bytes. `Exif.Photo.UserComment` is exposed without its charset header.

pub mod ifd;
pub mod tags;
pub mod value;
mod reader;
mod writer;

pub use reader::{decode, decode_entries};
pub use writer::{build_tree, encode, extract_thumbnail};

use crate::codec::Change;
use crate::error::{MetaError, Result};
use crate::types::{TagRecord, TagValue, TypeName};
use ifd::ByteOrder;

/// Records replacing `change.key` in an EXIF table.
///
/// Lists of numeric values become one space-separated record; lists are
/// rejected for `Ascii` and `Comment` tags. Raw bytes are accepted only for
/// `Byte` and `Undefined` tags. The UCS2 tags join list elements with `; `.
pub fn records_for(change: &Change, stored: Option<TypeName>) -> Result<Vec<TagRecord>> {
    let key = change.key.as_str();
    let (group, tag) = tags::parse_key(key)?;
    if tags::is_pointer(group, tag) || tags::is_carrier(group, tag) {
        return Err(MetaError::InvalidKey(key.to_string()));
    }

    if tags::is_ucs2(key) {
        let text = match &change.value {
            TagValue::Text(text) => text.clone(),
            TagValue::List(items) => items.join("; "),
            TagValue::Bytes(_) => {
                return Err(MetaError::unsupported_type(key, "text", "bytes"));
            }
        };
        return Ok(vec![TagRecord::new(key, text, TypeName::Byte)]);
    }

    let type_name = change
        .type_hint
        .or(stored)
        .or_else(|| tags::default_type(group, tag))
        .unwrap_or(TypeName::Ascii);

    let text = match &change.value {
        TagValue::Text(text) => text.clone(),
        TagValue::List(items) => match type_name {
            TypeName::Ascii | TypeName::Comment => {
                return Err(MetaError::unsupported_type(key, type_name.as_str(), "list"));
            }
            _ => items.join(" "),
        },
        TagValue::Bytes(bytes) => match type_name {
            TypeName::Byte | TypeName::Undefined => bytes
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            _ => return Err(MetaError::unsupported_type(key, type_name.as_str(), "bytes")),
        },
    };

    // Fail at merge time rather than when the segment is written.
    value::from_text(key, type_name, &text, ByteOrder::Little)?;
    Ok(vec![TagRecord::new(key, text, type_name)])
}
