//! PNG: metadata lives in ancillary chunks.
//!
//! - `eXIf` holds the bare TIFF block
//! - iTXt `XML:com.adobe.xmp` holds the XMP packet
//! - tEXt/iTXt `Comment` holds the comment
//! - tEXt `Raw profile type iptc` holds a hex dump of Photoshop resources
//! - `iCCP` holds the deflated ICC profile
//!
//! Compressed text chunks (zTXt, compressed iTXt) are left as they are.

use img_parts::png::{Png, PngChunk};
use img_parts::{Bytes, ImageICC};

use super::{Container, ImageFormat, SegmentRange};
use crate::error::{MetaError, Result};
use crate::iptc::photoshop::{self, SIGNATURE};
use crate::types::Standard;

const IHDR: [u8; 4] = *b"IHDR";
const EXIF: [u8; 4] = *b"eXIf";
const ICCP: [u8; 4] = *b"iCCP";
const TEXT: [u8; 4] = *b"tEXt";
const ITXT: [u8; 4] = *b"iTXt";
const ZTXT: [u8; 4] = *b"zTXt";

const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";
const COMMENT_KEYWORD: &[u8] = b"Comment";
const IPTC_KEYWORD: &[u8] = b"Raw profile type iptc";

#[derive(Debug, Clone)]
pub struct PngContainer {
    png: Png,
}

/// Parsed text chunk. `text` is `None` for compressed content.
struct TextChunk<'a> {
    keyword: &'a [u8],
    text: Option<Vec<u8>>,
}

fn parse_text_chunk(kind: [u8; 4], data: &[u8]) -> Option<TextChunk<'_>> {
    let nul = data.iter().position(|b| *b == 0)?;
    let keyword = &data[..nul];
    let rest = &data[nul + 1..];
    let text = match kind {
        TEXT => Some(rest.iter().map(|b| *b as char).collect::<String>().into_bytes()),
        ITXT => {
            let (&compressed, rest) = rest.split_first()?;
            let rest = rest.get(1..)?;
            let lang_end = rest.iter().position(|b| *b == 0)?;
            let rest = &rest[lang_end + 1..];
            let translated_end = rest.iter().position(|b| *b == 0)?;
            let text = &rest[translated_end + 1..];
            (compressed == 0).then(|| text.to_vec())
        }
        ZTXT => None,
        _ => return None,
    };
    Some(TextChunk { keyword, text })
}

fn is_compressed_text(kind: [u8; 4], data: &[u8]) -> bool {
    parse_text_chunk(kind, data).is_some_and(|t| t.text.is_none())
}

fn classify(kind: [u8; 4], data: &[u8]) -> Option<Standard> {
    match kind {
        EXIF => Some(Standard::Exif),
        ICCP => Some(Standard::Icc),
        TEXT | ITXT | ZTXT => match parse_text_chunk(kind, data)?.keyword {
            XMP_KEYWORD => Some(Standard::Xmp),
            COMMENT_KEYWORD => Some(Standard::Comment),
            IPTC_KEYWORD => Some(Standard::Iptc),
            _ => None,
        },
        _ => None,
    }
}

fn itxt(keyword: &[u8], text: &[u8]) -> PngChunk {
    let mut data = Vec::with_capacity(keyword.len() + 5 + text.len());
    data.extend_from_slice(keyword);
    // NUL, uncompressed, method 0, empty language tag, empty translated keyword
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(text);
    PngChunk::new(ITXT, Bytes::from(data))
}

fn text(keyword: &[u8], text: &[u8]) -> PngChunk {
    let mut data = Vec::with_capacity(keyword.len() + 1 + text.len());
    data.extend_from_slice(keyword);
    data.push(0);
    data.extend_from_slice(text);
    PngChunk::new(TEXT, Bytes::from(data))
}

/// Decode an ImageMagick style raw profile: `\n<name>\n<length>\n<hex>`.
fn decode_raw_profile(text: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(text).ok()?;
    let mut lines = text.trim_start_matches('\n').splitn(3, '\n');
    let _name = lines.next()?;
    let len: usize = lines.next()?.trim().parse().ok()?;
    let digits: Vec<u8> = lines
        .next()?
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let mut out = Vec::with_capacity(len);
    for pair in digits.chunks_exact(2).take(len) {
        let hex = std::str::from_utf8(pair).ok()?;
        out.push(u8::from_str_radix(hex, 16).ok()?);
    }
    (out.len() == len).then_some(out)
}

fn encode_raw_profile(name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("\n{name}\n{:8}\n", data.len());
    for line in data.chunks(36) {
        for b in line {
            out.push_str(&format!("{b:02x}"));
        }
        out.push('\n');
    }
    out.into_bytes()
}

impl PngContainer {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let png = Png::from_bytes(Bytes::from(data))
            .map_err(|e| MetaError::corrupt(ImageFormat::Png, e.to_string()))?;
        if png.chunks().first().map(|c| c.kind()) != Some(IHDR) {
            return Err(MetaError::corrupt(ImageFormat::Png, "first chunk is not IHDR"));
        }
        Ok(Self { png })
    }

    /// Uncompressed text of the first chunk carrying `keyword`.
    fn text_of(&self, keyword: &[u8]) -> Option<Vec<u8>> {
        self.png.chunks().iter().find_map(|chunk| {
            let parsed = parse_text_chunk(chunk.kind(), chunk.contents())?;
            if parsed.keyword != keyword {
                return None;
            }
            if parsed.text.is_none() {
                log::debug!(
                    "Skipping compressed PNG text chunk {}",
                    String::from_utf8_lossy(keyword)
                );
            }
            parsed.text
        })
    }

    /// Photoshop resources (or bare IIM) stored in the raw IPTC profile.
    fn raw_iptc_profile(&self) -> Option<Vec<u8>> {
        decode_raw_profile(&self.text_of(IPTC_KEYWORD)?)
    }

    /// Replace all uncompressed chunks of `standard` with `chunk`, placing a
    /// new chunk right after IHDR.
    fn replace(&mut self, standard: Standard, chunk: Option<PngChunk>) {
        let chunks = self.png.chunks_mut();
        chunks.retain(|c| {
            classify(c.kind(), c.contents()) != Some(standard)
                || is_compressed_text(c.kind(), c.contents())
        });
        if let Some(chunk) = chunk {
            let at = chunks
                .iter()
                .position(|c| c.kind() == IHDR)
                .map_or(0, |i| i + 1);
            chunks.insert(at, chunk);
        }
    }
}

impl Container for PngContainer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn read_segment(&self, standard: Standard) -> Result<Option<Vec<u8>>> {
        let data = match standard {
            Standard::Exif => self
                .png
                .chunks()
                .iter()
                .find(|c| c.kind() == EXIF)
                .map(|c| {
                    let data: &[u8] = c.contents();
                    data.strip_prefix(b"Exif\0\0").unwrap_or(data).to_vec()
                }),
            Standard::Icc => self.png.icc_profile().map(|b| b.to_vec()),
            Standard::Xmp => self.text_of(XMP_KEYWORD),
            Standard::Comment => self.text_of(COMMENT_KEYWORD),
            Standard::Iptc => self.raw_iptc_profile().map(|profile| {
                if profile.starts_with(SIGNATURE) {
                    photoshop::find_iptc(&profile).map(<[u8]>::to_vec).unwrap_or_default()
                } else {
                    profile
                }
            }),
        };
        Ok(data)
    }

    fn write_segment(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()> {
        match standard {
            Standard::Exif => {
                let chunk = payload.map(|p| PngChunk::new(EXIF, Bytes::copy_from_slice(p)));
                self.replace(standard, chunk);
            }
            Standard::Icc => self.png.set_icc_profile(payload.map(Bytes::copy_from_slice)),
            Standard::Xmp => {
                let chunk = payload.map(|p| itxt(XMP_KEYWORD, p));
                self.replace(standard, chunk);
            }
            Standard::Comment => {
                let chunk = payload.map(|p| {
                    if p.is_ascii() {
                        text(COMMENT_KEYWORD, p)
                    } else {
                        itxt(COMMENT_KEYWORD, p)
                    }
                });
                self.replace(standard, chunk);
            }
            Standard::Iptc => {
                let existing = self
                    .raw_iptc_profile()
                    .filter(|profile| profile.starts_with(SIGNATURE));
                let irb = photoshop::replace_iptc(existing.as_deref(), payload);
                let chunk = (!irb.is_empty())
                    .then(|| text(IPTC_KEYWORD, &encode_raw_profile("iptc", &irb)));
                self.replace(standard, chunk);
            }
        }
        log::debug!(
            "{} {standard} chunk in PNG",
            if payload.is_some() { "Wrote" } else { "Removed" }
        );
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.png.clone().encoder().write_to(&mut output)?;
        Ok(output)
    }

    fn locate_segments(&self) -> Result<Vec<SegmentRange>> {
        let data = self.to_bytes()?;
        let mut ranges = Vec::new();
        let mut pos = 8;
        while pos + 12 <= data.len() {
            let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                as usize;
            let kind = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
            let end = (pos + 12 + len).min(data.len());
            let body = &data[(pos + 8).min(end)..(pos + 8 + len).min(end)];
            if let Some(standard) = classify(kind, body) {
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
