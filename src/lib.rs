//! # imgmeta
//!
//! Read and rewrite the metadata embedded in image files: EXIF, IPTC, XMP,
//! ICC profiles and comments, for JPEG, PNG, WebP and TIFF.
//!
//! ## Quick Start
//!
//! Open an image, read a standard as a [`MetadataSet`], merge changes back:
//!
//! ```rust,no_run
//! use imgmeta::{Image, MetadataSet};
//!
//! fn main() -> imgmeta::Result<()> {
//!     let mut image = Image::open("photo.jpg")?;
//!
//!     let exif = image.read_exif()?;
//!     println!("Camera: {:?}", exif.get("Exif.Image.Model"));
//!
//!     let mut changes = MetadataSet::new();
//!     changes.insert("Xmp.dc.subject", vec!["beach", "sunset"]);
//!     changes.insert("Xmp.dc.title", "lang=\"x-default\" Evening");
//!     image.modify_xmp(&changes)?;
//!
//!     // Standards you did not touch are left byte-for-byte as they were.
//!     image.clear_comment()?;
//!     image.close()
//! }
//! ```
//!
//! ## Tag Tables
//!
//! For full control over types, read and write [`TagTable`]s: ordered
//! `(key, value, type)` records exactly as they are encoded.
//!
//! ```rust,no_run
//! use imgmeta::{Image, Standard, TagRecord, TagTable, TypeName};
//!
//! fn main() -> imgmeta::Result<()> {
//!     let bytes = std::fs::read("photo.png")?;
//!     let mut image = Image::from_bytes(bytes)?;
//!
//!     for record in &image.read_table(Standard::Exif)? {
//!         println!("{} [{}] = {}", record.key, record.type_name, record.value);
//!     }
//!
//!     let mut table = TagTable::new();
//!     table.push(TagRecord::new("Exif.Image.Orientation", "6", TypeName::Short));
//!     image.modify_table(Standard::Exif, &table)?;
//!
//!     std::fs::write("photo-rotated.png", image.get_bytes()?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | EXIF | IPTC | XMP | ICC | Comment |
//! |--------|------|------|-----|-----|---------|
//! | JPEG | APP1 | APP13 | APP1 | APP2 | COM |
//! | PNG | eXIf | raw profile text | iTXt | iCCP | tEXt/iTXt |
//! | WebP | EXIF | - | XMP | ICCP | - |
//! | TIFF | IFD0 | IFD0 tag | IFD0 tag | IFD0 tag | - |
//!
//! ## Modules
//!
//! - [`image`]: the [`Image`] handle
//! - [`container`]: format detection and segment access per container
//! - [`exif`], [`iptc`], [`xmp`]: tag table codecs
//! - [`codec`]: merging changes and collapsing tables into sets
//! - [`config`]: configuration and log level
//! - [`error`]: the [`MetaError`] type

pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod exif;
pub mod image;
pub mod iptc;
pub mod types;
pub mod xmp;

pub use config::{Config, LogLevel, set_log_level};
pub use container::{ImageFormat, SegmentRange};
pub use error::{MetaError, Result};
pub use image::Image;
pub use types::{MetadataSet, Standard, TagRecord, TagTable, TagValue, TypeName};
