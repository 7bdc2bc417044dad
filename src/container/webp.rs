//! WebP: metadata lives in RIFF chunks of the extended format.
//!
//! Any of `ICCP`, `EXIF` or `XMP ` requires a `VP8X` header whose flags
//! announce them. A simple-format file gets one synthesized from the
//! VP8/VP8L bitstream header on first write.

use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::WebP;
use img_parts::Bytes;

use super::{Container, ImageFormat, SegmentRange, unsupported};
use crate::error::{MetaError, Result};
use crate::types::Standard;

const VP8X: [u8; 4] = *b"VP8X";
const VP8: [u8; 4] = *b"VP8 ";
const VP8L: [u8; 4] = *b"VP8L";
const ALPH: [u8; 4] = *b"ALPH";
const ANIM: [u8; 4] = *b"ANIM";
const ICCP: [u8; 4] = *b"ICCP";
const EXIF: [u8; 4] = *b"EXIF";
const XMP: [u8; 4] = *b"XMP ";

const FLAG_ICC: u8 = 0x20;
const FLAG_ALPHA: u8 = 0x10;
const FLAG_EXIF: u8 = 0x08;
const FLAG_XMP: u8 = 0x04;
const FLAG_ANIMATION: u8 = 0x02;

#[derive(Debug, Clone)]
pub struct WebpContainer {
    webp: WebP,
}

fn chunk_id(standard: Standard) -> Option<[u8; 4]> {
    match standard {
        Standard::Exif => Some(EXIF),
        Standard::Xmp => Some(XMP),
        Standard::Icc => Some(ICCP),
        Standard::Iptc | Standard::Comment => None,
    }
}

fn classify(id: [u8; 4]) -> Option<Standard> {
    match id {
        EXIF => Some(Standard::Exif),
        XMP => Some(Standard::Xmp),
        ICCP => Some(Standard::Icc),
        _ => None,
    }
}

fn data_of(chunk: &RiffChunk) -> Option<&Bytes> {
    match chunk.content() {
        RiffContent::Data(data) => Some(data),
        _ => None,
    }
}

/// Canvas size and alpha flag from a VP8 or VP8L bitstream header.
fn canvas(id: [u8; 4], data: &[u8]) -> Option<(u32, u32, bool)> {
    match id {
        VP8 => {
            if data.len() < 10 || data[3..6] != [0x9D, 0x01, 0x2A] {
                return None;
            }
            let width = u16::from_le_bytes([data[6], data[7]]) & 0x3FFF;
            let height = u16::from_le_bytes([data[8], data[9]]) & 0x3FFF;
            Some((width as u32, height as u32, false))
        }
        VP8L => {
            if data.len() < 5 || data[0] != 0x2F {
                return None;
            }
            let bits = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
            let width = (bits & 0x3FFF) + 1;
            let height = ((bits >> 14) & 0x3FFF) + 1;
            let alpha = (bits >> 28) & 1 == 1;
            Some((width, height, alpha))
        }
        _ => None,
    }
}

fn vp8x_payload(flags: u8, width: u32, height: u32) -> Vec<u8> {
    let mut out = vec![flags, 0, 0, 0];
    out.extend_from_slice(&(width.saturating_sub(1)).to_le_bytes()[..3]);
    out.extend_from_slice(&(height.saturating_sub(1)).to_le_bytes()[..3]);
    out
}

impl WebpContainer {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let webp = WebP::from_bytes(Bytes::from(data))
            .map_err(|e| MetaError::corrupt(ImageFormat::WebP, e.to_string()))?;
        Ok(Self { webp })
    }

    fn has(&self, id: [u8; 4]) -> bool {
        self.webp.chunks().iter().any(|c| c.id() == id)
    }

    /// Create or update the `VP8X` chunk so its flags match the chunks
    /// present.
    fn sync_vp8x(&mut self) -> Result<()> {
        let mut wanted = 0u8;
        for (id, flag) in [(ICCP, FLAG_ICC), (EXIF, FLAG_EXIF), (XMP, FLAG_XMP)] {
            if self.has(id) {
                wanted |= flag;
            }
        }
        let managed = FLAG_ICC | FLAG_EXIF | FLAG_XMP;

        let chunks = self.webp.chunks_mut();
        if let Some(pos) = chunks.iter().position(|c| c.id() == VP8X) {
            let mut payload = data_of(&chunks[pos]).map(|d| d.to_vec()).unwrap_or_default();
            if payload.len() < 10 {
                return Err(MetaError::corrupt(ImageFormat::WebP, "VP8X chunk too short"));
            }
            payload[0] = (payload[0] & !managed) | wanted;
            chunks[pos] = RiffChunk::new(VP8X, RiffContent::Data(Bytes::from(payload)));
            return Ok(());
        }
        if wanted == 0 {
            return Ok(());
        }

        let (width, height, mut alpha) = chunks
            .iter()
            .find_map(|c| canvas(c.id(), data_of(c)?))
            .ok_or_else(|| MetaError::corrupt(ImageFormat::WebP, "no VP8/VP8L bitstream"))?;
        alpha |= chunks.iter().any(|c| c.id() == ALPH);
        let mut flags = wanted;
        if alpha {
            flags |= FLAG_ALPHA;
        }
        if chunks.iter().any(|c| c.id() == ANIM) {
            flags |= FLAG_ANIMATION;
        }
        log::debug!("Synthesizing VP8X for {width}x{height} WebP");
        chunks.insert(
            0,
            RiffChunk::new(VP8X, RiffContent::Data(Bytes::from(vp8x_payload(flags, width, height)))),
        );
        Ok(())
    }
}

impl Container for WebpContainer {
    fn format(&self) -> ImageFormat {
        ImageFormat::WebP
    }

    fn read_segment(&self, standard: Standard) -> Result<Option<Vec<u8>>> {
        let Some(id) = chunk_id(standard) else {
            return Ok(None);
        };
        let data = self
            .webp
            .chunks()
            .iter()
            .find(|c| c.id() == id)
            .and_then(data_of)
            .map(|data| {
                let data: &[u8] = data;
                match standard {
                    Standard::Exif => data.strip_prefix(b"Exif\0\0").unwrap_or(data).to_vec(),
                    _ => data.to_vec(),
                }
            });
        Ok(data)
    }

    fn write_segment(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()> {
        let id = chunk_id(standard).ok_or_else(|| unsupported(ImageFormat::WebP, standard))?;

        let chunks = self.webp.chunks_mut();
        chunks.retain(|c| c.id() != id);
        if let Some(payload) = payload {
            let chunk = RiffChunk::new(id, RiffContent::Data(Bytes::copy_from_slice(payload)));
            match standard {
                // ICCP directly follows VP8X
                Standard::Icc => {
                    let at = chunks.iter().position(|c| c.id() == VP8X).map_or(0, |i| i + 1);
                    chunks.insert(at, chunk);
                }
                // EXIF and XMP trail the image data, EXIF first
                Standard::Exif => {
                    let at = chunks.iter().position(|c| c.id() == XMP).unwrap_or(chunks.len());
                    chunks.insert(at, chunk);
                }
                _ => chunks.push(chunk),
            }
        }
        self.sync_vp8x()?;

        log::debug!(
            "{} {standard} chunk in WebP",
            if payload.is_some() { "Wrote" } else { "Removed" }
        );
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.webp.clone().encoder().write_to(&mut output)?;
        Ok(output)
    }

    fn locate_segments(&self) -> Result<Vec<SegmentRange>> {
        let data = self.to_bytes()?;
        let mut ranges = Vec::new();
        let mut pos = 12;
        while pos + 8 <= data.len() {
            let id = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
            let size =
                u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                    as usize;
            let end = (pos + 8 + size + size % 2).min(data.len());
            if let Some(standard) = classify(id) {
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
