//! Error types for metadata operations.
//!
//! Every fallible engine call returns [`MetaError`]. Failures never leave a
//! partially applied write behind: the container (and the file on disk for
//! path-backed images) keeps its previous state.

use thiserror::Error;

use crate::container::ImageFormat;
use crate::types::Standard;

/// Main error type for the metadata engine.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The container signature (magic bytes) is not recognized.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Segment boundaries of the container cannot be parsed.
    #[error("Corrupt {format} container: {message}")]
    CorruptContainer { format: ImageFormat, message: String },

    /// A tag directory's lengths or offsets disagree with the segment size.
    #[error("Malformed {standard} directory: {message}")]
    MalformedDirectory { standard: Standard, message: String },

    /// A value's shape does not match the tag's declared type family.
    #[error("Unsupported value for {key}: expected {expected}, got {found}")]
    UnsupportedType {
        key: String,
        expected: String,
        found: String,
    },

    /// A textual value cannot be converted to the tag's binary type.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// A metadata key does not follow the `Family.Group.Name` layout.
    #[error("Invalid metadata key: {0}")]
    InvalidKey(String),

    /// The container format cannot carry this metadata standard.
    #[error("{format} images cannot store {standard} metadata")]
    UnsupportedStandard { format: ImageFormat, standard: Standard },

    /// An in-memory buffer is too large for 32-bit container length fields.
    #[error("Only images smaller than 2GB can be opened: got {len} bytes (limit {max})")]
    SizeLimit { len: u64, max: u64 },

    /// An encoded segment does not fit into the container's segment limit.
    #[error("{standard} segment of {len} bytes exceeds the {max} byte container limit")]
    SegmentTooLarge {
        standard: Standard,
        len: usize,
        max: usize,
    },

    /// The image handle has already been closed.
    #[error("The image has been closed, so it is not allowed to operate")]
    ClosedHandle,

    /// Reading or persisting the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetaError>;

impl MetaError {
    /// Creates a corrupt-container error.
    pub fn corrupt<S: Into<String>>(format: ImageFormat, message: S) -> Self {
        Self::CorruptContainer {
            format,
            message: message.into(),
        }
    }

    /// Creates a malformed-directory error for the given standard.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgmeta::{MetaError, Standard};
    ///
    /// let err = MetaError::malformed(Standard::Exif, "IFD0 offset out of bounds");
    /// assert!(matches!(err, MetaError::MalformedDirectory { .. }));
    /// ```
    pub fn malformed<S: Into<String>>(standard: Standard, message: S) -> Self {
        Self::MalformedDirectory {
            standard,
            message: message.into(),
        }
    }

    /// Creates a value-shape mismatch error.
    pub fn unsupported_type<K, E, F>(key: K, expected: E, found: F) -> Self
    where
        K: Into<String>,
        E: Into<String>,
        F: Into<String>,
    {
        Self::UnsupportedType {
            key: key.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates an invalid-value error.
    pub fn invalid_value<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns true if the error was caused by operating on a closed handle.
    pub fn is_closed_handle(&self) -> bool {
        matches!(self, Self::ClosedHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = MetaError::malformed(Standard::Iptc, "dataset runs past end");
        assert_eq!(
            err.to_string(),
            "Malformed iptc directory: dataset runs past end"
        );

        let err = MetaError::SizeLimit {
            len: 1 << 31,
            max: 1 << 31,
        };
        assert!(err.to_string().contains("2147483648"));

        let err = MetaError::UnsupportedStandard {
            format: ImageFormat::WebP,
            standard: Standard::Comment,
        };
        assert_eq!(err.to_string(), "WebP images cannot store comment metadata");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MetaError = io.into();
        assert!(matches!(err, MetaError::Io(_)));
    }

    #[test]
    fn closed_handle_predicate() {
        assert!(MetaError::ClosedHandle.is_closed_handle());
        assert!(!MetaError::InvalidKey("x".into()).is_closed_handle());
    }
}
