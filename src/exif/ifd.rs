//! TIFF image file directories: byte order, header, directory parsing and
//! serialization.
//!
//! Serialization always appends to an existing buffer and returns the offset
//! of the written directory. A compact EXIF block starts from an 8-byte
//! header; an in-place TIFF rewrite starts from the whole original file.

use super::value::FieldType;
use crate::error::{MetaError, Result};
use crate::types::Standard;

/// Byte order of a TIFF structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Header bytes: `II*\0` or `MM\0*`.
    pub fn header(self) -> [u8; 4] {
        match self {
            ByteOrder::Little => *b"II*\0",
            ByteOrder::Big => *b"MM\0*",
        }
    }

    pub fn u16_from(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    pub fn u32_from(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    pub fn u64_from(self, b: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    pub fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    pub fn u64_bytes(self, v: u64) -> [u8; 8] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    /// Bounds-checked read of a `u16` at `offset`.
    pub fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let b = data.get(offset..offset.checked_add(2)?)?;
        Some(self.u16_from([b[0], b[1]]))
    }

    /// Bounds-checked read of a `u32` at `offset`.
    pub fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let b = data.get(offset..offset.checked_add(4)?)?;
        Some(self.u32_from([b[0], b[1], b[2], b[3]]))
    }
}

/// Parse the 8-byte TIFF header into the byte order and IFD0 offset.
pub fn read_header(data: &[u8]) -> Result<(ByteOrder, u32)> {
    if data.len() < 8 {
        return Err(MetaError::malformed(Standard::Exif, "TIFF header too short"));
    }
    let order = match &data[0..4] {
        b"II*\0" => ByteOrder::Little,
        b"MM\0*" => ByteOrder::Big,
        _ => return Err(MetaError::malformed(Standard::Exif, "invalid TIFF byte order")),
    };
    let ifd0 = order
        .read_u32(data, 4)
        .ok_or_else(|| MetaError::malformed(Standard::Exif, "TIFF header too short"))?;
    Ok((order, ifd0))
}

/// One directory entry with its value bytes resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    pub data: Vec<u8>,
}

impl Entry {
    /// Offset held by a pointer entry (`Long` or `Ifd`, one component).
    pub fn pointer(&self, order: ByteOrder) -> Option<u32> {
        match self.field_type {
            FieldType::Long | FieldType::Ifd if self.count >= 1 => order.read_u32(&self.data, 0),
            _ => None,
        }
    }

    /// A `Long` entry holding a single value.
    pub fn long(tag: u16, value: u32, order: ByteOrder) -> Self {
        Self {
            tag,
            field_type: FieldType::Long,
            count: 1,
            data: order.u32_bytes(value).to_vec(),
        }
    }
}

/// A parsed directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub entries: Vec<Entry>,
    pub next: u32,
}

impl Directory {
    pub fn find(&self, tag: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// Parse the directory at `offset`.
///
/// Entries with unknown field types are kept with one-byte components; one
/// whose value would lie outside `data` is skipped with a warning. For known
/// types, a count, offset or value extent outside `data` is a malformed
/// directory.
pub fn read_directory(data: &[u8], offset: usize, order: ByteOrder) -> Result<Directory> {
    let malformed = |msg: String| MetaError::malformed(Standard::Exif, msg);

    let count = order
        .read_u16(data, offset)
        .ok_or_else(|| malformed(format!("directory offset {offset} out of bounds")))?
        as usize;
    let start = offset + 2;
    let end = start + count * 12;
    if end > data.len() {
        return Err(malformed(format!(
            "directory at {offset} declares {count} entries past the end of the data"
        )));
    }
    // Some writers omit the trailing next-IFD pointer.
    let next = order.read_u32(data, end).unwrap_or(0);

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let eo = start + i * 12;
        let tag = order.u16_from([data[eo], data[eo + 1]]);
        let code = order.u16_from([data[eo + 2], data[eo + 3]]);
        let n = order.u32_from([data[eo + 4], data[eo + 5], data[eo + 6], data[eo + 7]]);

        let field_type = FieldType::from_code(code);
        let unknown = matches!(field_type, FieldType::Unknown(_));
        if unknown {
            log::warn!("Tag 0x{tag:04x} has unknown field type {code}, assuming 1-byte components");
        }

        let size = (n as usize)
            .checked_mul(field_type.size())
            .ok_or_else(|| malformed(format!("tag 0x{tag:04x} count {n} overflows")))?;

        let value = if size <= 4 {
            data[eo + 8..eo + 8 + size].to_vec()
        } else {
            let value_offset =
                order.u32_from([data[eo + 8], data[eo + 9], data[eo + 10], data[eo + 11]]) as usize;
            match value_offset.checked_add(size).filter(|&e| e <= data.len()) {
                Some(value_end) => data[value_offset..value_end].to_vec(),
                None if unknown => {
                    log::warn!("Skipping tag 0x{tag:04x}: value out of bounds");
                    continue;
                }
                None => {
                    return Err(malformed(format!(
                        "tag 0x{tag:04x} value ({size} bytes at {value_offset}) out of bounds"
                    )));
                }
            }
        };

        entries.push(Entry {
            tag,
            field_type,
            count: n,
            data: value,
        });
    }

    log::debug!("Read directory at {offset}: {} entries", entries.len());
    Ok(Directory { entries, next })
}

/// A directory entry exactly as stored: its value field is the inline value
/// or an offset into the buffer it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    pub value: [u8; 4],
}

/// The entries of the directory at `offset` without resolving their values.
pub fn read_raw_entries(data: &[u8], offset: usize, order: ByteOrder) -> Result<Vec<RawEntry>> {
    let count = order.read_u16(data, offset).ok_or_else(|| {
        MetaError::malformed(Standard::Exif, format!("directory offset {offset} out of bounds"))
    })? as usize;
    let start = offset + 2;
    let entries = data
        .get(start..start + count * 12)
        .ok_or_else(|| {
            MetaError::malformed(
                Standard::Exif,
                format!("directory at {offset} declares {count} entries past the end of the data"),
            )
        })?
        .chunks_exact(12)
        .map(|e| RawEntry {
            tag: order.u16_from([e[0], e[1]]),
            field_type: FieldType::from_code(order.u16_from([e[2], e[3]])),
            count: order.u32_from([e[4], e[5], e[6], e[7]]),
            value: [e[8], e[9], e[10], e[11]],
        })
        .collect();
    Ok(entries)
}

/// What follows a directory in its chain.
#[derive(Debug, Clone, Default)]
pub enum Next {
    #[default]
    None,
    /// Keep pointing at an existing directory in the buffer.
    Offset(u32),
    Ifd(Box<IfdNode>),
}

/// A directory to be written, with its sub-directories.
#[derive(Debug, Clone, Default)]
pub struct IfdNode {
    pub entries: Vec<Entry>,
    /// Sub-directories, keyed by the pointer tag that references them.
    pub subs: Vec<(u16, IfdNode)>,
    /// Entries copied as stored, for a directory appended to the buffer
    /// they were read from.
    pub linked: Vec<RawEntry>,
    /// JPEG thumbnail referenced by `JPEGInterchangeFormat`.
    pub thumbnail: Option<Vec<u8>>,
    pub next: Next,
}

const TAG_JPEG_IF: u16 = 0x0201;
const TAG_JPEG_IF_LEN: u16 = 0x0202;

enum Slot<'a> {
    Data(&'a Entry),
    Linked(&'a RawEntry),
    Sub(&'a IfdNode),
    ThumbOffset,
    ThumbLength(u32),
}

fn align(buf: &mut Vec<u8>) {
    if buf.len() % 2 != 0 {
        buf.push(0);
    }
}

fn to_offset(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| MetaError::malformed(Standard::Exif, "TIFF structure exceeds 4 GiB"))
}

/// Append `node` (and everything it references) to `buf`, returning the
/// offset of the directory. Entries are written in ascending tag order.
pub fn write_ifd(buf: &mut Vec<u8>, node: &IfdNode, order: ByteOrder) -> Result<u32> {
    let mut slots: Vec<(u16, Slot<'_>)> = Vec::new();
    for entry in &node.entries {
        if node.thumbnail.is_some() && matches!(entry.tag, TAG_JPEG_IF | TAG_JPEG_IF_LEN) {
            continue;
        }
        if node.subs.iter().any(|(tag, _)| *tag == entry.tag) {
            continue;
        }
        slots.push((entry.tag, Slot::Data(entry)));
    }
    for (tag, sub) in &node.subs {
        slots.push((*tag, Slot::Sub(sub)));
    }
    for raw in &node.linked {
        if slots.iter().any(|(tag, _)| *tag == raw.tag) {
            continue;
        }
        slots.push((raw.tag, Slot::Linked(raw)));
    }
    if let Some(thumb) = &node.thumbnail {
        slots.push((TAG_JPEG_IF, Slot::ThumbOffset));
        slots.push((TAG_JPEG_IF_LEN, Slot::ThumbLength(to_offset(thumb.len())?)));
    }
    slots.sort_by_key(|(tag, _)| *tag);

    let count = u16::try_from(slots.len())
        .map_err(|_| MetaError::malformed(Standard::Exif, "too many directory entries"))?;

    align(buf);
    let start = buf.len();
    let ifd_offset = to_offset(start)?;
    buf.extend_from_slice(&order.u16_bytes(count));
    buf.resize(start + 2 + slots.len() * 12 + 4, 0);

    for (i, (tag, slot)) in slots.iter().enumerate() {
        let (field_type, n, value): (FieldType, u32, [u8; 4]) = match slot {
            Slot::Data(entry) => {
                let mut inline = [0u8; 4];
                if entry.data.len() <= 4 {
                    inline[..entry.data.len()].copy_from_slice(&entry.data);
                } else {
                    align(buf);
                    inline = order.u32_bytes(to_offset(buf.len())?);
                    buf.extend_from_slice(&entry.data);
                }
                (entry.field_type, entry.count, inline)
            }
            Slot::Linked(raw) => (raw.field_type, raw.count, raw.value),
            Slot::Sub(sub) => {
                let off = write_ifd(buf, sub, order)?;
                (FieldType::Long, 1, order.u32_bytes(off))
            }
            Slot::ThumbOffset => {
                let thumb = node.thumbnail.as_deref().unwrap_or_default();
                let off = to_offset(buf.len())?;
                buf.extend_from_slice(thumb);
                (FieldType::Long, 1, order.u32_bytes(off))
            }
            Slot::ThumbLength(len) => (FieldType::Long, 1, order.u32_bytes(*len)),
        };

        let eo = start + 2 + i * 12;
        buf[eo..eo + 2].copy_from_slice(&order.u16_bytes(*tag));
        buf[eo + 2..eo + 4].copy_from_slice(&order.u16_bytes(field_type.code()));
        buf[eo + 4..eo + 8].copy_from_slice(&order.u32_bytes(n));
        buf[eo + 8..eo + 12].copy_from_slice(&value);
    }

    let next = match &node.next {
        Next::None => 0,
        Next::Offset(off) => *off,
        Next::Ifd(next) => write_ifd(buf, next, order)?,
    };
    let np = start + 2 + slots.len() * 12;
    buf[np..np + 4].copy_from_slice(&order.u32_bytes(next));

    Ok(ifd_offset)
}

/// Serialize a standalone TIFF block with `ifd0` right after the header.
pub fn write_tiff(ifd0: &IfdNode, order: ByteOrder) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    buf.extend_from_slice(&order.header());
    buf.extend_from_slice(&order.u32_bytes(8));
    write_ifd(&mut buf, ifd0, order)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascii(tag: u16, text: &str) -> Entry {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Entry {
            tag,
            field_type: FieldType::Ascii,
            count: data.len() as u32,
            data,
        }
    }

    // ── Header ───────────────────────────────────────────────────────

    #[test]
    fn header_byte_orders() {
        assert_eq!(read_header(b"II*\0\x08\0\0\0").unwrap(), (ByteOrder::Little, 8));
        assert_eq!(read_header(b"MM\0*\0\0\0\x08").unwrap(), (ByteOrder::Big, 8));
        assert!(read_header(b"XX*\0\x08\0\0\0").is_err());
        assert!(read_header(b"II*\0").is_err());
    }

    // ── Round trip ───────────────────────────────────────────────────

    #[test]
    fn write_then_read_with_sub_ifd() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let photo = IfdNode {
                entries: vec![ascii(0x9003, "2024:01:01 10:00:00")],
                ..Default::default()
            };
            let ifd0 = IfdNode {
                entries: vec![ascii(0x0110, "Model X"), ascii(0x010f, "Make")],
                subs: vec![(0x8769, photo)],
                ..Default::default()
            };
            let data = write_tiff(&ifd0, order).unwrap();

            let (o, off) = read_header(&data).unwrap();
            assert_eq!(o, order);
            let dir = read_directory(&data, off as usize, order).unwrap();
            let tags: Vec<u16> = dir.entries.iter().map(|e| e.tag).collect();
            assert_eq!(tags, vec![0x010f, 0x0110, 0x8769]);
            assert_eq!(dir.find(0x0110).unwrap().data, b"Model X\0");

            let sub_off = dir.find(0x8769).unwrap().pointer(order).unwrap();
            let sub = read_directory(&data, sub_off as usize, order).unwrap();
            assert_eq!(sub.entries[0].data, b"2024:01:01 10:00:00\0");
            assert_eq!(dir.next, 0);
        }
    }

    #[test]
    fn thumbnail_is_relocated() {
        let ifd1 = IfdNode {
            entries: vec![Entry {
                tag: 0x0103,
                field_type: FieldType::Short,
                count: 1,
                data: vec![6, 0],
            }],
            thumbnail: Some(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            ..Default::default()
        };
        let ifd0 = IfdNode {
            entries: vec![ascii(0x010f, "Make")],
            next: Next::Ifd(Box::new(ifd1)),
            ..Default::default()
        };
        let order = ByteOrder::Little;
        let data = write_tiff(&ifd0, order).unwrap();
        let dir0 = read_directory(&data, 8, order).unwrap();
        assert_ne!(dir0.next, 0);

        let dir1 = read_directory(&data, dir0.next as usize, order).unwrap();
        let off = dir1.find(0x0201).unwrap().pointer(order).unwrap() as usize;
        let len = dir1.find(0x0202).unwrap().pointer(order).unwrap() as usize;
        assert_eq!(&data[off..off + len], &[0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn linked_entries_keep_their_value_field() {
        let order = ByteOrder::Little;
        let original = write_tiff(
            &IfdNode {
                entries: vec![ascii(0x010f, "Long maker name"), ascii(0x0110, "M")],
                ..Default::default()
            },
            order,
        )
        .unwrap();
        let raw = read_raw_entries(&original, 8, order).unwrap();
        assert_eq!(raw.len(), 2);

        let mut buf = original.clone();
        let node = IfdNode {
            entries: vec![ascii(0x0131, "editor")],
            linked: raw.clone(),
            ..Default::default()
        };
        let off = write_ifd(&mut buf, &node, order).unwrap();
        assert_eq!(buf.len() - original.len(), 2 + 3 * 12 + 4 + 7);

        let dir = read_directory(&buf, off as usize, order).unwrap();
        assert_eq!(dir.find(0x010f).unwrap().data, b"Long maker name\0");
        assert_eq!(dir.find(0x0110).unwrap().data, b"M\0");
        assert_eq!(read_raw_entries(&buf, off as usize, order).unwrap()[0], raw[0]);
    }

    // ── Malformed input ──────────────────────────────────────────────

    #[test]
    fn entry_count_past_end_is_malformed() {
        let mut data = b"II*\0\x08\0\0\0".to_vec();
        data.extend_from_slice(&[0x10, 0x00]); // 16 entries, none present
        let err = read_directory(&data, 8, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, MetaError::MalformedDirectory { .. }));
    }

    #[test]
    fn value_offset_past_end_is_malformed() {
        let mut data = b"II*\0\x08\0\0\0".to_vec();
        data.extend_from_slice(&[1, 0]);
        data.extend_from_slice(&[0x0f, 0x01, 2, 0, 20, 0, 0, 0, 0xFF, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        let err = read_directory(&data, 8, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, MetaError::MalformedDirectory { .. }));
    }

    #[test]
    fn unknown_field_type_is_kept() {
        let mut data = b"II*\0\x08\0\0\0".to_vec();
        data.extend_from_slice(&[2, 0]);
        data.extend_from_slice(&[0x00, 0x01, 99, 0, 3, 0, 0, 0, 7, 8, 9, 0]);
        data.extend_from_slice(&[0x12, 0x01, 3, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        let order = ByteOrder::Little;
        let dir = read_directory(&data, 8, order).unwrap();
        assert_eq!(dir.entries.len(), 2);
        let odd = dir.find(0x0100).unwrap();
        assert_eq!(odd.field_type, FieldType::Unknown(99));
        assert_eq!(odd.data, vec![7, 8, 9]);

        // Written back with its own type code.
        let out = write_tiff(
            &IfdNode {
                entries: dir.entries.clone(),
                ..Default::default()
            },
            order,
        )
        .unwrap();
        let again = read_directory(&out, 8, order).unwrap();
        assert_eq!(again.find(0x0100), Some(odd));
    }

    #[test]
    fn unknown_field_type_out_of_bounds_is_skipped() {
        let mut data = b"II*\0\x08\0\0\0".to_vec();
        data.extend_from_slice(&[2, 0]);
        data.extend_from_slice(&[0x00, 0x01, 99, 0, 64, 0, 0, 0, 0xF0, 0, 0, 0]);
        data.extend_from_slice(&[0x12, 0x01, 3, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        let dir = read_directory(&data, 8, ByteOrder::Little).unwrap();
        assert_eq!(dir.entries.len(), 1);
        assert_eq!(dir.entries[0].tag, 0x0112);
    }
}
