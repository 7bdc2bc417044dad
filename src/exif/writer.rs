use super::ifd::{self, ByteOrder, Entry, IfdNode, Next};
use super::tags::{self, Group};
use super::value;
use crate::codec::ucs2;
use crate::error::Result;
use crate::types::{TagRecord, TagTable, TypeName};

/// Encode a tag table as a compact TIFF block.
///
/// The byte order of `original` is kept (little-endian when there is none).
/// A thumbnail referenced by the original IFD1 is copied and relocated as
/// long as the table still has `Exif.Thumbnail.JPEGInterchangeFormat`.
/// Records unchanged from `original` keep their original entry bytes.
pub fn encode(table: &TagTable, original: Option<&[u8]>) -> Result<Vec<u8>> {
    let order = original
        .and_then(|data| ifd::read_header(data).ok())
        .map(|(order, _)| order)
        .unwrap_or(ByteOrder::Little);

    let thumbnail = if table.get("Exif.Thumbnail.JPEGInterchangeFormat").is_some() {
        original.and_then(extract_thumbnail)
    } else {
        None
    };

    let originals = original
        .and_then(|data| super::reader::decode_entries(data).ok())
        .unwrap_or_default();

    let ifd0 = build_tree(table, order, thumbnail, &originals)?;
    let out = ifd::write_tiff(&ifd0, order)?;
    log::debug!("Encoded {} EXIF records into {} bytes", table.len(), out.len());
    Ok(out)
}

/// Build the IFD0 tree (with EXIF, GPS, interoperability and IFD1
/// directories) for a tag table.
///
/// A record equal to one in `originals` reuses that entry as read, so text
/// that does not survive decoding (Latin-1 or NUL-separated ASCII, odd UCS2,
/// unknown field types) is written back unchanged. `originals` must be in
/// `order`.
pub fn build_tree(
    table: &TagTable,
    order: ByteOrder,
    thumbnail: Option<Vec<u8>>,
    originals: &[(TagRecord, Entry)],
) -> Result<IfdNode> {
    let mut image = Vec::new();
    let mut photo = Vec::new();
    let mut gps = Vec::new();
    let mut iop = Vec::new();
    let mut thumb = Vec::new();

    for record in table {
        let (group, tag) = tags::parse_key(&record.key)?;
        if tags::is_pointer(group, tag) || tags::is_carrier(group, tag) {
            log::debug!("Skipping structural tag {}", record.key);
            continue;
        }
        if group == Group::Thumbnail && matches!(tag, tags::TAG_JPEG_IF | tags::TAG_JPEG_IF_LEN) {
            continue;
        }

        let entry = match originals.iter().find(|(original, _)| original.key == record.key) {
            Some((original, entry)) if original == record => entry.clone(),
            _ => encode_record(record, group, tag, order)?,
        };

        let entries = match group {
            Group::Image => &mut image,
            Group::Photo => &mut photo,
            Group::GpsInfo => &mut gps,
            Group::Iop => &mut iop,
            Group::Thumbnail => &mut thumb,
        };
        if entries.iter().any(|e: &Entry| e.tag == tag) {
            log::warn!("Duplicate EXIF tag {}; keeping the first value", record.key);
            continue;
        }
        entries.push(entry);
    }

    let mut photo = IfdNode {
        entries: photo,
        ..Default::default()
    };
    if !iop.is_empty() {
        photo.subs.push((tags::TAG_IOP_IFD, IfdNode {
            entries: iop,
            ..Default::default()
        }));
    }

    let mut ifd0 = IfdNode {
        entries: image,
        ..Default::default()
    };
    if !photo.entries.is_empty() || !photo.subs.is_empty() {
        ifd0.subs.push((tags::TAG_EXIF_IFD, photo));
    }
    if !gps.is_empty() {
        ifd0.subs.push((tags::TAG_GPS_IFD, IfdNode {
            entries: gps,
            ..Default::default()
        }));
    }
    if !thumb.is_empty() || thumbnail.is_some() {
        ifd0.next = Next::Ifd(Box::new(IfdNode {
            entries: thumb,
            thumbnail,
            ..Default::default()
        }));
    }
    Ok(ifd0)
}

fn encode_record(record: &TagRecord, group: Group, tag: u16, order: ByteOrder) -> Result<Entry> {
    let type_name = resolve_type(record.type_name, group, tag);
    let encoded = if tags::is_ucs2(&record.key) && type_name == TypeName::Byte {
        value::from_text(&record.key, type_name, &ucs2::to_ucs2(&record.value), order)?
    } else {
        value::from_text(&record.key, type_name, &record.value, order)?
    };
    Ok(Entry {
        tag,
        field_type: encoded.field_type,
        count: encoded.count,
        data: encoded.data,
    })
}

/// Caller-supplied `str`/`array` records take the dictionary type, or
/// `Ascii` for tags the dictionary does not know.
fn resolve_type(type_name: TypeName, group: Group, tag: u16) -> TypeName {
    match type_name {
        TypeName::Str | TypeName::Array => {
            tags::default_type(group, tag).unwrap_or(TypeName::Ascii)
        }
        other => other,
    }
}

/// The JPEG thumbnail referenced from IFD1, if present and in bounds.
pub fn extract_thumbnail(data: &[u8]) -> Option<Vec<u8>> {
    let (order, ifd0) = ifd::read_header(data).ok()?;
    let dir0 = ifd::read_directory(data, ifd0 as usize, order).ok()?;
    if dir0.next == 0 {
        return None;
    }
    let dir1 = ifd::read_directory(data, dir0.next as usize, order).ok()?;
    let offset = dir1.find(tags::TAG_JPEG_IF)?.pointer(order)? as usize;
    let len = dir1.find(tags::TAG_JPEG_IF_LEN)?.pointer(order)? as usize;
    data.get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
}
