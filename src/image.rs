//! The [`Image`] handle: one opened container plus its lazily decoded
//! metadata.
//!
//! Every write is staged on a copy of the container. The copy replaces the
//! live one only after encoding (and, for path-backed images, the atomic
//! file rewrite) succeeded, so a failed call leaves memory and disk as they
//! were.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::codec::{self, Change};
use crate::config::Config;
use crate::container::{self, Container, ImageFormat, SegmentRange, check_buffer_len};
use crate::error::{MetaError, Result};
use crate::types::{MetadataSet, Standard, TagTable};
use crate::{exif, iptc, xmp};

#[derive(Debug)]
enum Source {
    Path(PathBuf),
    Buffer,
}

#[derive(Debug)]
struct OpenImage {
    container: Box<dyn Container>,
    source: Source,
    config: Config,
    /// Decoded tag tables, per standard, until that standard is rewritten.
    tables: HashMap<Standard, TagTable>,
    backed_up: bool,
}

#[derive(Debug)]
enum State {
    Open(Box<OpenImage>),
    Closed,
}

/// An opened image.
///
/// ```rust,no_run
/// use imgmeta::{Image, MetadataSet};
///
/// let mut image = Image::open("photo.jpg")?;
/// let exif = image.read_exif()?;
/// println!("{:?}", exif.get("Exif.Image.Make"));
///
/// let mut changes = MetadataSet::new();
/// changes.insert("Iptc.Application2.Keywords", vec!["tree", "sky"]);
/// image.modify_iptc(&changes)?;
/// image.close()?;
/// # Ok::<(), imgmeta::MetaError>(())
/// ```
#[derive(Debug)]
pub struct Image {
    state: State,
}

impl Image {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, &Config::default())
    }

    /// Open a file. Writes go back to the same path.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        check_buffer_len(std::fs::metadata(path)?.len())?;
        let data = std::fs::read(path)?;
        let container = container::open(data)?;
        let format = container.format();
        log::info!("Opened {} as {} ({})", path.display(), format, format.mime_type());
        Ok(Self::with_container(
            container,
            Source::Path(path.to_path_buf()),
            config,
        ))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_config(data, &Config::default())
    }

    /// Wrap an in-memory image. Use [`Image::get_bytes`] to get the result.
    pub fn from_bytes_with_config(data: Vec<u8>, config: &Config) -> Result<Self> {
        let container = container::open(data)?;
        Ok(Self::with_container(container, Source::Buffer, config))
    }

    fn with_container(container: Box<dyn Container>, source: Source, config: &Config) -> Self {
        Self {
            state: State::Open(Box::new(OpenImage {
                container,
                source,
                config: config.clone(),
                tables: HashMap::new(),
                backed_up: false,
            })),
        }
    }

    fn inner(&self) -> Result<&OpenImage> {
        match &self.state {
            State::Open(inner) => Ok(inner),
            State::Closed => Err(MetaError::ClosedHandle),
        }
    }

    fn inner_mut(&mut self) -> Result<&mut OpenImage> {
        match &mut self.state {
            State::Open(inner) => Ok(inner),
            State::Closed => Err(MetaError::ClosedHandle),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn format(&self) -> Result<ImageFormat> {
        Ok(self.inner()?.container.format())
    }

    /// Where each metadata segment sits in the serialized image.
    pub fn locate_segments(&self) -> Result<Vec<SegmentRange>> {
        self.inner()?.container.locate_segments()
    }

    // ── Reading ──────────────────────────────────────────────────────

    /// The decoded records of a tagged standard, in on-disk order.
    pub fn read_table(&mut self, standard: Standard) -> Result<TagTable> {
        require_tagged(standard)?;
        self.inner_mut()?.table(standard)
    }

    /// The metadata of a tagged standard, with repeated keys collapsed.
    pub fn read(&mut self, standard: Standard) -> Result<MetadataSet> {
        let table = self.read_table(standard)?;
        Ok(codec::collapse(&table, standard))
    }

    pub fn read_exif(&mut self) -> Result<MetadataSet> {
        self.read(Standard::Exif)
    }

    pub fn read_iptc(&mut self) -> Result<MetadataSet> {
        self.read(Standard::Iptc)
    }

    pub fn read_xmp(&mut self) -> Result<MetadataSet> {
        self.read(Standard::Xmp)
    }

    /// The XMP packet exactly as stored (empty when there is none).
    pub fn read_raw_xmp(&self) -> Result<Vec<u8>> {
        Ok(self
            .inner()?
            .container
            .read_segment(Standard::Xmp)?
            .unwrap_or_default())
    }

    /// The comment as text; Latin-1 is assumed when it is not UTF-8.
    pub fn read_comment(&self) -> Result<String> {
        let data = self.inner()?.container.read_segment(Standard::Comment)?;
        Ok(data
            .map(|d| iptc::decode_text(&d, false))
            .unwrap_or_default())
    }

    pub fn read_icc(&self) -> Result<Vec<u8>> {
        Ok(self
            .inner()?
            .container
            .read_segment(Standard::Icc)?
            .unwrap_or_default())
    }

    // ── Modifying ────────────────────────────────────────────────────

    /// Merge `changes` into the stored metadata of `standard` and write it
    /// back. An empty list value deletes its key.
    pub fn modify(&mut self, standard: Standard, changes: &MetadataSet) -> Result<()> {
        self.apply(standard, &codec::changes_from_set(changes))
    }

    /// Like [`Image::modify`], from `(key, value, type)` records. `array`
    /// records hold `", "`-joined lists; records sharing a key are combined.
    pub fn modify_table(&mut self, standard: Standard, records: &TagTable) -> Result<()> {
        self.apply(standard, &codec::changes_from_table(records))
    }

    pub fn modify_exif(&mut self, changes: &MetadataSet) -> Result<()> {
        self.modify(Standard::Exif, changes)
    }

    pub fn modify_iptc(&mut self, changes: &MetadataSet) -> Result<()> {
        self.modify(Standard::Iptc, changes)
    }

    pub fn modify_xmp(&mut self, changes: &MetadataSet) -> Result<()> {
        self.modify(Standard::Xmp, changes)
    }

    /// Replace the comment. An empty comment removes it.
    pub fn modify_comment(&mut self, comment: &str) -> Result<()> {
        let payload = (!comment.is_empty()).then(|| comment.as_bytes());
        self.write(Standard::Comment, payload)
    }

    /// Replace the ICC profile. An empty profile removes it.
    pub fn modify_icc(&mut self, profile: &[u8]) -> Result<()> {
        let payload = (!profile.is_empty()).then_some(profile);
        self.write(Standard::Icc, payload)
    }

    /// Store an XMP packet verbatim after checking it is well-formed XML.
    pub fn modify_raw_xmp(&mut self, packet: &[u8]) -> Result<()> {
        xmp::validate_packet(packet)?;
        self.write(Standard::Xmp, Some(packet))
    }

    fn apply(&mut self, standard: Standard, changes: &[Change]) -> Result<()> {
        require_tagged(standard)?;
        let inner = self.inner_mut()?;
        let format = inner.container.format();
        if !format.supports(standard) {
            return Err(MetaError::UnsupportedStandard { format, standard });
        }

        let existing = inner.table(standard)?;
        let merged = codec::merge(&existing, changes, standard)?;
        let payload = if merged.is_empty() {
            None
        } else {
            Some(inner.encode(standard, &merged)?)
        };
        inner.commit(standard, payload.as_deref())?;
        log::info!(
            "Updated {} {standard} key(s), {} record(s) stored",
            changes.len(),
            merged.len()
        );
        Ok(())
    }

    fn write(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()> {
        let inner = self.inner_mut()?;
        let format = inner.container.format();
        if !format.supports(standard) {
            return Err(MetaError::UnsupportedStandard { format, standard });
        }
        inner.commit(standard, payload)
    }

    // ── Clearing ─────────────────────────────────────────────────────

    /// Remove every segment of `standard`. Standards the format cannot hold
    /// are already absent.
    pub fn clear(&mut self, standard: Standard) -> Result<()> {
        let inner = self.inner_mut()?;
        if !inner.container.format().supports(standard) {
            log::debug!("{} images carry no {standard} data", inner.container.format());
            return Ok(());
        }
        inner.commit(standard, None)
    }

    pub fn clear_exif(&mut self) -> Result<()> {
        self.clear(Standard::Exif)
    }

    pub fn clear_iptc(&mut self) -> Result<()> {
        self.clear(Standard::Iptc)
    }

    pub fn clear_xmp(&mut self) -> Result<()> {
        self.clear(Standard::Xmp)
    }

    pub fn clear_comment(&mut self) -> Result<()> {
        self.clear(Standard::Comment)
    }

    pub fn clear_icc(&mut self) -> Result<()> {
        self.clear(Standard::Icc)
    }

    // ── Output and lifecycle ─────────────────────────────────────────

    /// The image as it currently stands, including all applied changes.
    pub fn get_bytes(&self) -> Result<Vec<u8>> {
        self.inner()?.container.to_bytes()
    }

    /// Release the image. Any later call, including a second `close`,
    /// fails with [`MetaError::ClosedHandle`].
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(inner) => {
                if let Source::Path(path) = &inner.source {
                    log::debug!("Closed {}", path.display());
                }
                Ok(())
            }
            State::Closed => Err(MetaError::ClosedHandle),
        }
    }
}

fn require_tagged(standard: Standard) -> Result<()> {
    if standard.is_tagged() {
        Ok(())
    } else {
        Err(MetaError::invalid_value("standard", standard.name()))
    }
}

impl OpenImage {
    fn table(&mut self, standard: Standard) -> Result<TagTable> {
        if let Some(table) = self.tables.get(&standard) {
            return Ok(table.clone());
        }
        let table = match self.container.read_segment(standard)? {
            Some(data) if !data.is_empty() => match standard {
                Standard::Exif => exif::decode(&data)?,
                Standard::Iptc => iptc::decode(&data)?,
                Standard::Xmp => xmp::decode(&data)?,
                Standard::Comment | Standard::Icc => TagTable::new(),
            },
            _ => TagTable::new(),
        };
        log::debug!("Decoded {} {standard} record(s)", table.len());
        self.tables.insert(standard, table.clone());
        Ok(table)
    }

    fn encode(&self, standard: Standard, table: &TagTable) -> Result<Vec<u8>> {
        match standard {
            Standard::Exif => {
                let original = self.container.read_segment(Standard::Exif)?;
                exif::encode(table, original.as_deref())
            }
            Standard::Iptc => iptc::encode(table),
            Standard::Xmp => {
                let original = self.container.read_segment(Standard::Xmp)?;
                xmp::encode(table, original.as_deref(), self.config.xmp_padding)
            }
            Standard::Comment | Standard::Icc => Err(MetaError::invalid_value("standard", standard.name())),
        }
    }

    /// Write `payload` on a staged copy, persist it, then swap it in.
    fn commit(&mut self, standard: Standard, payload: Option<&[u8]>) -> Result<()> {
        let mut staged = self.container.box_clone();
        staged.write_segment(standard, payload)?;
        self.persist(staged.as_ref())?;

        self.container = staged;
        if self.container.format() == ImageFormat::Tiff {
            // Every TIFF rewrite moves IFD0.
            self.tables.clear();
        } else {
            self.tables.remove(&standard);
        }
        Ok(())
    }

    fn persist(&mut self, staged: &dyn Container) -> Result<()> {
        let Source::Path(path) = &self.source else {
            return Ok(());
        };
        let bytes = staged.to_bytes()?;
        check_buffer_len(bytes.len() as u64)?;

        if self.config.backup_originals && !self.backed_up {
            backup_file(path)?;
            self.backed_up = true;
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = std::fs::metadata(path)?.permissions();
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().set_permissions(permissions)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| MetaError::Io(e.error))?;
        log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Copy the original file to `<name>.<ext>.bak` (or `<name>.bak`) unless
/// that copy exists.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.bak", ext.to_string_lossy())),
        None => path.with_extension("bak"),
    };

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path)?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}
