use std::collections::HashSet;

use super::ifd::{self, ByteOrder, Directory, Entry};
use super::tags::{self, Group};
use super::value::{self, FieldType};
use crate::codec::ucs2;
use crate::error::{MetaError, Result};
use crate::types::{Standard, TagRecord, TagTable, TypeName};

/// Decode a TIFF-structured EXIF block into a tag table.
///
/// IFD0 maps to `Image`, its EXIF and GPS sub-directories to `Photo` and
/// `GPSInfo`, the interoperability directory to `Iop` and IFD1 to
/// `Thumbnail`. Pointer tags and the XMP/IPTC/ICC carrier tags are not
/// reported.
pub fn decode(data: &[u8]) -> Result<TagTable> {
    let table: TagTable = decode_entries(data)?
        .into_iter()
        .map(|(record, _)| record)
        .collect();
    log::debug!("Decoded {} EXIF records", table.len());
    Ok(table)
}

/// Like [`decode`], pairing each record with the entry it was read from.
pub fn decode_entries(data: &[u8]) -> Result<Vec<(TagRecord, Entry)>> {
    let (order, ifd0) = ifd::read_header(data)?;
    let mut walker = Walker {
        data,
        order,
        visited: HashSet::new(),
        records: Vec::new(),
    };

    let dir0 = walker.walk(ifd0, Group::Image)?;
    if dir0.next != 0 {
        walker.walk(dir0.next, Group::Thumbnail)?;
    }
    Ok(walker.records)
}

struct Walker<'a> {
    data: &'a [u8],
    order: ByteOrder,
    visited: HashSet<u32>,
    records: Vec<(TagRecord, Entry)>,
}

impl Walker<'_> {
    fn walk(&mut self, offset: u32, group: Group) -> Result<Directory> {
        if !self.visited.insert(offset) {
            return Err(MetaError::malformed(
                Standard::Exif,
                format!("directory chain loops back to offset {offset}"),
            ));
        }
        let dir = ifd::read_directory(self.data, offset as usize, self.order)?;

        let mut subs = Vec::new();
        for entry in &dir.entries {
            if tags::is_pointer(group, entry.tag) {
                match entry.pointer(self.order) {
                    Some(off) if off != 0 => subs.push((sub_group(entry.tag), off)),
                    _ => log::warn!("Ignoring invalid pointer tag 0x{:04x}", entry.tag),
                }
                continue;
            }
            if tags::is_carrier(group, entry.tag) {
                continue;
            }
            let record = record_for(group, entry, self.order);
            self.records.push((record, entry.clone()));
        }

        for (sub, off) in subs {
            self.walk(off, sub)?;
        }
        Ok(dir)
    }
}

fn sub_group(pointer: u16) -> Group {
    match pointer {
        tags::TAG_GPS_IFD => Group::GpsInfo,
        tags::TAG_IOP_IFD => Group::Iop,
        _ => Group::Photo,
    }
}

fn record_for(group: Group, entry: &Entry, order: ByteOrder) -> TagRecord {
    let key = tags::key_for(group, entry.tag);

    if entry.field_type == FieldType::Undefined
        && tags::default_type(group, entry.tag) == Some(TypeName::Comment)
    {
        let text = value::decode_comment(&entry.data, order);
        return TagRecord::new(key, text, TypeName::Comment);
    }

    let text = value::to_text(entry.field_type, &entry.data, order);
    if tags::is_ucs2(&key) && entry.field_type == FieldType::Byte {
        match ucs2::from_ucs2(&text) {
            Ok(decoded) => return TagRecord::new(key, decoded, TypeName::Byte),
            // Undefined keeps the bytes from being re-encoded as UCS2 text.
            Err(e) => {
                log::warn!("Keeping raw bytes of {key}: {e}");
                return TagRecord::new(key, text, TypeName::Undefined);
            }
        }
    }
    TagRecord::new(key, text, entry.field_type.type_name())
}
