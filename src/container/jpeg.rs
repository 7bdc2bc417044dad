//! JPEG: metadata lives in APPn and COM marker segments before the scan.

use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::{Bytes, ImageICC};

use super::{Container, ImageFormat, SegmentRange, check_segment_len};
use crate::error::{MetaError, Result};
use crate::iptc::photoshop::{self, PHOTOSHOP_HEADER};
use crate::types::Standard;

const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP13: u8 = 0xED;
const COM: u8 = 0xFE;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// Largest payload of one marker segment (the 16-bit length counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = 65533;

#[derive(Debug, Clone)]
pub struct JpegContainer {
    jpeg: Jpeg,
}

/// Which standard a marker segment carries, if any.
fn classify(marker: u8, contents: &[u8]) -> Option<Standard> {
    match marker {
        APP1 if contents.starts_with(EXIF_HEADER) => Some(Standard::Exif),
        APP1 if contents.starts_with(XMP_HEADER) => Some(Standard::Xmp),
        APP2 if contents.starts_with(ICC_HEADER) => Some(Standard::Icc),
        APP13 if contents.starts_with(PHOTOSHOP_HEADER) => Some(Standard::Iptc),
        COM => Some(Standard::Comment),
        _ => None,
    }
}

impl JpegContainer {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let jpeg = Jpeg::from_bytes(Bytes::from(data))
            .map_err(|e| MetaError::corrupt(ImageFormat::Jpeg, e.to_string()))?;
        Ok(Self { jpeg })
    }

    fn segments_of(&self, standard: Standard) -> impl Iterator<Item = &JpegSegment> {
        self.jpeg
            .segments()
            .iter()
            .filter(move |s| classify(s.marker(), s.contents()) == Some(standard))
    }

    /// Photoshop resource blocks of every APP13 segment, concatenated.
    fn resource_blocks(&self) -> Option<Vec<u8>> {
        let mut irb = Vec::new();
        let mut found = false;
        for segment in self.segments_of(Standard::Iptc) {
            irb.extend_from_slice(&segment.contents()[PHOTOSHOP_HEADER.len()..]);
            found = true;
        }
        found.then_some(irb)
    }

    /// Replace every segment of `standard` with `segment`, at the position
    /// of the first one. New segments go after the leading APPn run.
    fn replace(&mut self, standard: Standard, segment: Option<JpegSegment>) {
        let segments = self.jpeg.segments_mut();
        let first = segments
            .iter()
            .position(|s| classify(s.marker(), s.contents()) == Some(standard));
        let insert_at = first.unwrap_or_else(|| {
            segments
                .iter()
                .position(|s| !(0xE0..=0xEF).contains(&s.marker()))
                .unwrap_or(segments.len())
        });

        segments.retain(|s| classify(s.marker(), s.contents()) != Some(standard));
        if let Some(segment) = segment {
            let at = insert_at.min(segments.len());
            segments.insert(at, segment);
        }
    }

    fn prefixed(marker: u8, standard: Standard, header: &[u8], payload: &[u8]) -> Result<JpegSegment> {
        check_segment_len(standard, header.len() + payload.len(), MAX_SEGMENT_PAYLOAD)?;
        let mut contents = Vec::with_capacity(header.len() + payload.len());
        contents.extend_from_slice(header);
        contents.extend_from_slice(payload);
        Ok(JpegSegment::new_with_contents(marker, Bytes::from(contents)))
    }
}

impl Container for JpegContainer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn read_segment(&self, standard: Standard) -> Result<Option<Vec<u8>>> {
        let data = match standard {
            Standard::Exif => self
                .segments_of(standard)
                .next()
                .map(|s| s.contents()[EXIF_HEADER.len()..].to_vec()),
            Standard::Xmp => self
                .segments_of(standard)
                .next()
                .map(|s| s.contents()[XMP_HEADER.len()..].to_vec()),
            Standard::Comment => self.segments_of(standard).next().map(|s| s.contents().to_vec()),
            Standard::Icc => self.jpeg.icc_profile().map(|b| b.to_vec()),
            Standard::Iptc => self
                .resource_blocks()
                .and_then(|irb| photoshop::find_iptc(&irb).map(<[u8]>::to_vec)),
        };
        Ok(data)
    }

    fn write_segment(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()> {
        match standard {
            Standard::Exif => {
                let segment = payload
                    .map(|p| Self::prefixed(APP1, standard, EXIF_HEADER, p))
                    .transpose()?;
                self.replace(standard, segment);
            }
            Standard::Xmp => {
                let segment = payload
                    .map(|p| Self::prefixed(APP1, standard, XMP_HEADER, p))
                    .transpose()?;
                self.replace(standard, segment);
            }
            Standard::Comment => {
                let segment = payload
                    .map(|p| Self::prefixed(COM, standard, b"", p))
                    .transpose()?;
                self.replace(standard, segment);
            }
            Standard::Iptc => {
                let irb = photoshop::replace_iptc(self.resource_blocks().as_deref(), payload);
                let segment = if irb.is_empty() {
                    None
                } else {
                    Some(Self::prefixed(APP13, standard, PHOTOSHOP_HEADER, &irb)?)
                };
                self.replace(standard, segment);
            }
            Standard::Icc => {
                self.jpeg.set_icc_profile(payload.map(Bytes::copy_from_slice));
            }
        }
        log::debug!(
            "{} {standard} segment in JPEG",
            if payload.is_some() { "Wrote" } else { "Removed" }
        );
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.jpeg.clone().encoder().write_to(&mut output)?;
        Ok(output)
    }

    fn locate_segments(&self) -> Result<Vec<SegmentRange>> {
        let data = self.to_bytes()?;
        let mut ranges = Vec::new();
        let mut pos = 2;
        while pos + 4 <= data.len() {
            if data[pos] != 0xFF {
                break;
            }
            let marker = data[pos + 1];
            if marker == 0xFF {
                pos += 1;
                continue;
            }
            if marker == SOS || marker == EOI {
                break;
            }
            if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
                pos += 2;
                continue;
            }
            let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            let end = (pos + 2 + len).min(data.len());
            let contents = &data[(pos + 4).min(end)..end];
            if let Some(standard) = classify(marker, contents) {
                ranges.push(SegmentRange {
                    standard,
                    offset: pos,
                    len: end - pos,
                });
            }
            pos = end;
        }
        Ok(ranges)
    }

    fn box_clone(&self) -> Box<dyn Container> {
        Box::new(self.clone())
    }
}
