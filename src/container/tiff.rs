//! TIFF: the file is itself an EXIF structure.
//!
//! XMP, IPTC and ICC ride along as IFD0 tags. Every rewrite appends a new
//! IFD0 to the end of the file and repoints the header at it. Strip and tile
//! data, and the directories chained after IFD0, stay where they are.
//!
//! An EXIF write rebuilds the EXIF/GPS sub-directories. A carrier write only
//! appends the new IFD0 and the payload: every other entry is linked to its
//! existing value.

use super::{Container, ImageFormat, SegmentRange, check_buffer_len, unsupported};
use crate::error::{MetaError, Result};
use crate::exif::ifd::{self, ByteOrder, Directory, Entry, IfdNode, Next, RawEntry};
use crate::exif::tags::{TAG_ICC_PROFILE, TAG_IPTC_NAA, TAG_XMP_PACKET};
use crate::exif::value::FieldType;
use crate::exif;
use crate::types::{Standard, TagTable};

/// Image-structure tags copied verbatim from the original IFD0.
const STRUCTURAL_TAGS: &[u16] = &[
    254, // NewSubfileType
    255, // SubfileType
    256, // ImageWidth
    257, // ImageLength
    258, // BitsPerSample
    259, // Compression
    262, // PhotometricInterpretation
    266, // FillOrder
    273, // StripOffsets
    277, // SamplesPerPixel
    278, // RowsPerStrip
    279, // StripByteCounts
    284, // PlanarConfiguration
    317, // Predictor
    320, // ColorMap
    322, // TileWidth
    323, // TileLength
    324, // TileOffsets
    325, // TileByteCounts
    330, // SubIFDs
    338, // ExtraSamples
    339, // SampleFormat
    347, // JPEGTables
    513, // JPEGInterchangeFormat
    514, // JPEGInterchangeFormatLength
    530, // YCbCrSubSampling
];

const CARRIER_TAGS: [u16; 3] = [TAG_XMP_PACKET, TAG_IPTC_NAA, TAG_ICC_PROFILE];

#[derive(Debug, Clone)]
pub struct TiffContainer {
    data: Vec<u8>,
    order: ByteOrder,
    ifd0: u32,
}

fn carrier_tag(standard: Standard) -> Option<u16> {
    match standard {
        Standard::Xmp => Some(TAG_XMP_PACKET),
        Standard::Iptc => Some(TAG_IPTC_NAA),
        Standard::Icc => Some(TAG_ICC_PROFILE),
        Standard::Exif | Standard::Comment => None,
    }
}

fn carrier_entry(tag: u16, payload: &[u8]) -> Entry {
    let field_type = if tag == TAG_XMP_PACKET {
        FieldType::Byte
    } else {
        FieldType::Undefined
    };
    Entry {
        tag,
        field_type,
        count: payload.len() as u32,
        data: payload.to_vec(),
    }
}

impl TiffContainer {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let corrupt = |e: MetaError| MetaError::corrupt(ImageFormat::Tiff, e.to_string());
        let (order, ifd0) = ifd::read_header(&data).map_err(corrupt)?;
        ifd::read_directory(&data, ifd0 as usize, order).map_err(corrupt)?;
        Ok(Self { data, order, ifd0 })
    }

    fn directory(&self) -> Result<Directory> {
        ifd::read_directory(&self.data, self.ifd0 as usize, self.order)
    }

    fn raw_entries(&self) -> Result<Vec<RawEntry>> {
        ifd::read_raw_entries(&self.data, self.ifd0 as usize, self.order)
    }

    /// Rebuild IFD0 from `table`, linking the original structure and
    /// carrier tags.
    fn rewrite_exif(&mut self, table: &TagTable) -> Result<()> {
        let originals = exif::decode_entries(&self.data)?;
        let mut node = exif::build_tree(table, self.order, None, &originals)?;
        node.entries
            .retain(|e| !STRUCTURAL_TAGS.contains(&e.tag) && !CARRIER_TAGS.contains(&e.tag));
        node.linked = self
            .raw_entries()?
            .into_iter()
            .filter(|e| STRUCTURAL_TAGS.contains(&e.tag) || CARRIER_TAGS.contains(&e.tag))
            .collect();
        self.append_ifd0(node)
    }

    /// Copy IFD0 with the carrier `tag` replaced by `payload`, or dropped.
    fn rewrite_carrier(&mut self, tag: u16, payload: Option<&[u8]>) -> Result<()> {
        let node = IfdNode {
            entries: payload
                .map(|payload| carrier_entry(tag, payload))
                .into_iter()
                .collect(),
            linked: self
                .raw_entries()?
                .into_iter()
                .filter(|e| e.tag != tag)
                .collect(),
            ..Default::default()
        };
        self.append_ifd0(node)
    }

    /// Append `node` as the new IFD0, chained to the original's successor,
    /// and point the header at it.
    fn append_ifd0(&mut self, mut node: IfdNode) -> Result<()> {
        let original = self.directory()?;
        node.next = match original.next {
            0 => Next::None,
            offset => Next::Offset(offset),
        };

        let mut buf = self.data.clone();
        let offset = ifd::write_ifd(&mut buf, &node, self.order)?;
        buf[4..8].copy_from_slice(&self.order.u32_bytes(offset));
        check_buffer_len(buf.len() as u64)?;

        log::debug!(
            "Appended IFD0 at {offset} ({} bytes added)",
            buf.len() - self.data.len()
        );
        self.data = buf;
        self.ifd0 = offset;
        Ok(())
    }
}

impl Container for TiffContainer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Tiff
    }

    fn read_segment(&self, standard: Standard) -> Result<Option<Vec<u8>>> {
        match standard {
            Standard::Exif => Ok(Some(self.data.clone())),
            Standard::Comment => Ok(None),
            _ => {
                let Some(tag) = carrier_tag(standard) else {
                    return Ok(None);
                };
                Ok(self.directory()?.find(tag).map(|e| e.data.clone()))
            }
        }
    }

    fn write_segment(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()> {
        match standard {
            Standard::Comment => return Err(unsupported(ImageFormat::Tiff, standard)),
            Standard::Exif => {
                let table = match payload {
                    Some(block) => exif::decode(block)?,
                    None => TagTable::new(),
                };
                self.rewrite_exif(&table)?;
            }
            _ => {
                let Some(tag) = carrier_tag(standard) else {
                    return Err(unsupported(ImageFormat::Tiff, standard));
                };
                self.rewrite_carrier(tag, payload)?;
            }
        }
        log::debug!(
            "{} {standard} in TIFF",
            if payload.is_some() { "Wrote" } else { "Removed" }
        );
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn locate_segments(&self) -> Result<Vec<SegmentRange>> {
        let data = &self.data;
        let start = self.ifd0 as usize;
        let count = self
            .order
            .read_u16(data, start)
            .ok_or_else(|| MetaError::corrupt(ImageFormat::Tiff, "IFD0 out of bounds"))?
            as usize;

        let mut ranges = vec![SegmentRange {
            standard: Standard::Exif,
            offset: start,
            len: 2 + count * 12 + 4,
        }];
        let directory = self.directory()?;
        for i in 0..count {
            let eo = start + 2 + i * 12;
            let Some(tag) = self.order.read_u16(data, eo) else {
                break;
            };
            let standard = match tag {
                TAG_XMP_PACKET => Standard::Xmp,
                TAG_IPTC_NAA => Standard::Iptc,
                TAG_ICC_PROFILE => Standard::Icc,
                _ => continue,
            };
            let len = directory.find(tag).map_or(0, |e| e.data.len());
            let offset = if len <= 4 {
                eo + 8
            } else {
                self.order.read_u32(data, eo + 8).unwrap_or_default() as usize
            };
            ranges.push(SegmentRange { standard, offset, len });
        }
        Ok(ranges)
    }

    fn box_clone(&self) -> Box<dyn Container> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(tag: u16, v: u16) -> Entry {
        Entry {
            tag,
            field_type: FieldType::Short,
            count: 1,
            data: v.to_le_bytes().to_vec(),
        }
    }

    /// A 1x1 grayscale TIFF whose single pixel byte sits at the end.
    fn tiny_tiff(strip_offset: u32) -> Vec<u8> {
        let order = ByteOrder::Little;
        let node = IfdNode {
            entries: vec![
                short(256, 1),
                short(257, 1),
                short(258, 8),
                short(259, 1),
                short(262, 1),
                Entry::long(273, strip_offset, order),
                short(277, 1),
                short(278, 1),
                Entry::long(279, 1, order),
                Entry {
                    tag: 0x010F,
                    field_type: FieldType::Ascii,
                    count: 6,
                    data: b"Maker\0".to_vec(),
                },
            ],
            ..Default::default()
        };
        ifd::write_tiff(&node, order).unwrap()
    }

    fn fixture() -> Vec<u8> {
        let len = tiny_tiff(0).len() as u32;
        let mut data = tiny_tiff(len);
        data.push(0xAB);
        data
    }

    fn strip_offset(container: &TiffContainer) -> u32 {
        let dir = container.directory().unwrap();
        dir.find(273).unwrap().pointer(ByteOrder::Little).unwrap()
    }

    #[test]
    fn exif_is_the_whole_file() {
        let data = fixture();
        let container = TiffContainer::parse(data.clone()).unwrap();
        let exif = container.read_segment(Standard::Exif).unwrap().unwrap();
        assert_eq!(exif, data);
        let table = exif::decode(&exif).unwrap();
        assert_eq!(table.get("Exif.Image.Make").unwrap().value, "Maker");
    }

    #[test]
    fn carrier_write_appends_ifd_and_keeps_strips() {
        let data = fixture();
        let pixel_at = data.len() - 1;
        let mut container = TiffContainer::parse(data).unwrap();
        container.write_segment(Standard::Xmp, Some(b"<x:xmpmeta/>")).unwrap();

        assert_eq!(
            container.read_segment(Standard::Xmp).unwrap(),
            Some(b"<x:xmpmeta/>".to_vec())
        );
        assert!(container.ifd0 as usize > pixel_at);
        assert_eq!(strip_offset(&container) as usize, pixel_at);
        assert_eq!(container.to_bytes().unwrap()[pixel_at], 0xAB);

        let table = exif::decode(&container.to_bytes().unwrap()).unwrap();
        assert_eq!(table.get("Exif.Image.Make").unwrap().value, "Maker");

        let ranges = container.locate_segments().unwrap();
        assert!(ranges.iter().any(|r| r.standard == Standard::Xmp && r.len == 12));
    }

    #[test]
    fn carrier_write_links_other_entries() {
        let data = fixture();
        let original_len = data.len();
        let mut container = TiffContainer::parse(data).unwrap();
        let before = container.raw_entries().unwrap();

        container.write_segment(Standard::Iptc, Some(&[0x1C, 2, 0, 0, 2, 0, 4])).unwrap();

        let after = container.raw_entries().unwrap();
        let kept: Vec<RawEntry> = after
            .iter()
            .filter(|e| e.tag != TAG_IPTC_NAA)
            .copied()
            .collect();
        assert_eq!(kept, before);
        // New IFD0 (one more entry) plus the payload, nothing else.
        let grown = container.to_bytes().unwrap().len() - original_len;
        assert!(grown <= 2 + 2 + (before.len() + 1) * 12 + 4 + 7, "grew by {grown}");

        container.write_segment(Standard::Iptc, None).unwrap();
        assert_eq!(container.raw_entries().unwrap(), before);
        assert_eq!(container.read_segment(Standard::Iptc).unwrap(), None);
    }

    #[test]
    fn exif_rewrite_keeps_structure_and_carriers() {
        let mut container = TiffContainer::parse(fixture()).unwrap();
        container.write_segment(Standard::Icc, Some(&[1, 2, 3, 4, 5])).unwrap();

        let mut table = exif::decode(&container.to_bytes().unwrap()).unwrap();
        table.push(crate::types::TagRecord::new(
            "Exif.Photo.UserComment",
            "hello",
            crate::types::TypeName::Comment,
        ));
        let block = exif::encode(&table, None).unwrap();
        container.write_segment(Standard::Exif, Some(&block)).unwrap();

        let decoded = exif::decode(&container.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.get("Exif.Photo.UserComment").unwrap().value, "hello");
        assert_eq!(decoded.get("Exif.Image.ImageWidth").unwrap().value, "1");
        assert_eq!(
            container.read_segment(Standard::Icc).unwrap(),
            Some(vec![1, 2, 3, 4, 5])
        );
    }

    #[test]
    fn comment_is_unsupported() {
        let mut container = TiffContainer::parse(fixture()).unwrap();
        assert_eq!(container.read_segment(Standard::Comment).unwrap(), None);
        assert!(matches!(
            container.write_segment(Standard::Comment, Some(b"x")).unwrap_err(),
            MetaError::UnsupportedStandard { .. }
        ));
    }
}
