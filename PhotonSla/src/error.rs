//! Error types for `PhotonSla`

use thiserror::Error;

/// The error type for `PhotonSla` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file was shorter on read than its reported length.
    #[error("could not read all expected bytes: got {actual} of {expected}")]
    IncompleteRead {
        /// Number of bytes the file reported.
        expected: u64,
        /// Number of bytes actually read.
        actual: u64,
    },

    // ==================== Photon Format Errors ====================
    /// Malformed or internally inconsistent Photon data.
    #[error("invalid Photon file: {0}")]
    Format(#[from] FormatError),

    /// Anti-aliasing companions require a version 2+ file.
    #[error("anti-aliasing is not supported by version {version} files")]
    AntiAliasingUnsupported {
        /// The file version.
        version: u32,
    },

    /// Invalid anti-aliasing level requested.
    #[error("invalid anti-aliasing level: {levels} (supported: 1-16)")]
    InvalidAntiAliasingLevel {
        /// The requested level count.
        levels: u32,
    },

    /// Layer index out of range.
    #[error("layer index {index} out of range (file has {count} layers)")]
    LayerIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of layers in the file.
        count: usize,
    },

    // ==================== Operation Errors ====================
    /// A long-running operation was cancelled between layers.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Preview image export failed.
    #[error("image error: {message}")]
    Image {
        /// The error message.
        message: String,
    },
}

/// Structural problems found while decoding Photon bytes.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A section runs past the end of the buffer.
    #[error("{section} truncated: need {needed} bytes at offset {offset}, buffer has {available}")]
    Truncated {
        /// Which section was being read.
        section: &'static str,
        /// Absolute offset of the section.
        offset: usize,
        /// Bytes the section needs.
        needed: usize,
        /// Total buffer length.
        available: usize,
    },

    /// The header magic did not match.
    #[error("invalid Photon magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// Expected magic value.
        expected: u32,
        /// Value found in the file.
        found: u32,
    },

    /// Version field is not a known Photon version.
    #[error("unsupported Photon version: {0}")]
    UnsupportedVersion(u32),

    /// Resolution is zero in one axis or too large to expand.
    #[error("invalid resolution: {x}x{y}")]
    InvalidResolution {
        /// Horizontal resolution.
        x: u32,
        /// Vertical resolution.
        y: u32,
    },

    /// Header fields contradict each other.
    #[error("inconsistent header: {0}")]
    Inconsistent(String),

    /// A section offset points outside the buffer.
    #[error("{section} offset {offset} out of bounds (buffer has {available} bytes)")]
    OffsetOutOfBounds {
        /// Which section the offset belongs to.
        section: &'static str,
        /// The offending offset.
        offset: usize,
        /// Total buffer length.
        available: usize,
    },
}

impl FormatError {
    /// Check that `len` bytes starting at `offset` fit in a buffer of `available` bytes.
    pub(crate) fn check_span(
        section: &'static str,
        offset: usize,
        len: usize,
        available: usize,
    ) -> std::result::Result<(), FormatError> {
        match offset.checked_add(len) {
            Some(end) if end <= available => Ok(()),
            _ => Err(FormatError::Truncated {
                section,
                offset,
                needed: len,
                available,
            }),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image {
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for `PhotonSla` operations.
pub type Result<T> = std::result::Result<T, Error>;
