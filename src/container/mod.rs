//! Image containers: locating, reading and rewriting metadata segments.
//!
//! Each format keeps its parsed structure in memory and only touches the
//! segments that carry metadata. Pixel data and unknown segments pass
//! through byte-for-byte.

mod jpeg;
mod png;
mod tiff;
mod webp;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MetaError, Result};
use crate::types::Standard;

pub use jpeg::JpegContainer;
pub use png::PngContainer;
pub use tiff::TiffContainer;
pub use webp::WebpContainer;

/// Buffers must be strictly smaller than this (container lengths are
/// 32-bit signed in several formats).
pub const MAX_BUFFER_LEN: u64 = 1 << 31;

/// Image container format, detected from the leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
}

impl ImageFormat {
    pub fn detect(data: &[u8]) -> Result<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Ok(ImageFormat::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Ok(ImageFormat::Png)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Ok(ImageFormat::WebP)
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Ok(ImageFormat::Tiff)
        } else {
            let head: Vec<String> = data.iter().take(8).map(|b| format!("{b:02x}")).collect();
            Err(MetaError::UnsupportedFormat(format!(
                "unrecognized signature [{}]",
                head.join(" ")
            )))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::WebP => "WebP",
            ImageFormat::Tiff => "TIFF",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Tiff => "image/tiff",
        }
    }

    /// Whether the format has a place for `standard`.
    pub fn supports(self, standard: Standard) -> bool {
        !matches!(
            (self, standard),
            (ImageFormat::WebP, Standard::Iptc | Standard::Comment)
                | (ImageFormat::Tiff, Standard::Comment)
        )
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte range of one metadata-carrying segment in the serialized image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRange {
    pub standard: Standard,
    /// Offset of the segment header (marker, chunk length or IFD entry).
    pub offset: usize,
    /// Length including headers.
    pub len: usize,
}

/// A parsed image container.
///
/// `write_segment` with `None` removes the segment. Writing a standard the
/// format cannot hold fails with [`MetaError::UnsupportedStandard`];
/// reading one yields `None`.
pub trait Container: Send + fmt::Debug {
    fn format(&self) -> ImageFormat;

    fn read_segment(&self, standard: Standard) -> Result<Option<Vec<u8>>>;

    fn write_segment(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()>;

    fn to_bytes(&self) -> Result<Vec<u8>>;

    fn locate_segments(&self) -> Result<Vec<SegmentRange>>;

    fn box_clone(&self) -> Box<dyn Container>;
}

impl Clone for Box<dyn Container> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

pub fn check_buffer_len(len: u64) -> Result<()> {
    if len >= MAX_BUFFER_LEN {
        return Err(MetaError::SizeLimit {
            len,
            max: MAX_BUFFER_LEN,
        });
    }
    Ok(())
}

/// Parse `data` into the container matching its signature.
pub fn open(data: Vec<u8>) -> Result<Box<dyn Container>> {
    check_buffer_len(data.len() as u64)?;
    let format = ImageFormat::detect(&data)?;
    log::debug!("Opening {format} image of {} bytes", data.len());
    let container: Box<dyn Container> = match format {
        ImageFormat::Jpeg => Box::new(JpegContainer::parse(data)?),
        ImageFormat::Png => Box::new(PngContainer::parse(data)?),
        ImageFormat::WebP => Box::new(WebpContainer::parse(data)?),
        ImageFormat::Tiff => Box::new(TiffContainer::parse(data)?),
    };
    Ok(container)
}

fn unsupported(format: ImageFormat, standard: Standard) -> MetaError {
    MetaError::UnsupportedStandard { format, standard }
}

/// Reject payloads that do not fit in one segment.
fn check_segment_len(standard: Standard, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(MetaError::SegmentTooLarge { standard, len, max });
    }
    Ok(())
}
