//! Error types for the NDTiff storage engine.
//!
//! Errors are layered the way I/O failures compose into format failures
//! compose into storage-level failures: an [`IoError`] can become a
//! [`ContainerError`], which can become a [`StorageError`] — the type
//! returned from the public API and the one stashed in the writer's shared
//! error slot (see [`crate::writer_thread`]).

use thiserror::Error;

/// Low-level I/O failures against a dataset's files on disk.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Preallocating a new container or index file failed (e.g. disk full).
    #[error("failed to preallocate {path}: {reason}")]
    Preallocate { path: String, reason: String },

    /// A positional read or write failed.
    #[error("positional I/O failed on {path} at offset {offset}: {reason}")]
    Positional {
        path: String,
        offset: u64,
        reason: String,
    },

    /// A read asked for a range that extends past the end of the file.
    #[error("range out of bounds: requested {requested} bytes at offset {offset}, file is {size} bytes")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Opening, creating, or truncating a file failed.
    #[error("filesystem error on {path}: {reason}")]
    Filesystem { path: String, reason: String },
}

/// Failures decoding/encoding the two binary schemas: axes keys and index
/// entries.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The coordinate's canonical JSON form could not be parsed.
    #[error("malformed coordinate JSON: {0}")]
    MalformedCoordinate(String),

    /// A coordinate axis value was neither a JSON integer nor a JSON string.
    #[error("axis {axis:?} has an unsupported value type")]
    UnsupportedAxisValue { axis: String },

    /// An `NDTiff.index` record was truncated or otherwise malformed.
    #[error("malformed index entry: {0}")]
    MalformedIndexEntry(String),
}

/// Failures parsing or writing the TIFF-compatible container format.
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Byte-order mark was neither `II` nor `MM`.
    #[error("invalid byte order mark: 0x{0:04x}")]
    InvalidByteOrderMark(u16),

    /// The classic-TIFF magic (42) was missing.
    #[error("invalid TIFF magic: expected 42, got {0}")]
    InvalidMagic(u16),

    /// The NDTiff discriminator (483729) did not match.
    #[error("not an NDTiff container: expected discriminator 483729, got {0}")]
    NotNdTiff(u32),

    /// The summary-metadata header magic (2355492) did not match.
    #[error("invalid summary metadata header: expected 2355492, got {0}")]
    InvalidSummaryMetadataMagic(u32),

    /// The container file is too small to hold a valid header.
    #[error("file too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },
}

/// Top-level errors returned by the storage engine's public API.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An axis was written once as an integer and later as a string (or
    /// vice versa).
    #[error("axis {axis:?} was previously used with a {expected} value, got a {actual} value")]
    AxisTypeConflict {
        axis: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A write was submitted after `finishedWriting` completed.
    #[error("dataset is finished, no further writes are accepted")]
    DatasetFinished,

    /// 16-bit RGB images are rejected outright (see Design Notes, open
    /// question 1): only 8-bit RGB is supported.
    #[error("16-bit RGB images are not supported")]
    Rgb16NotSupported,

    /// A bit depth with no corresponding [`crate::pixel::PixelType`] (other
    /// than the 16-bit RGB case, which gets its own variant above).
    #[error("unsupported bit depth {bit_depth} (rgb={rgb})")]
    UnsupportedBitDepth { bit_depth: u32, rgb: bool },

    /// The stitched reader found tiles disagreeing on pixel type/format.
    #[error("stitched region spans tiles with inconsistent pixel types")]
    InconsistentTileType,

    /// A pyramid level was requested that does not exist.
    #[error("pyramid level {0} does not exist")]
    NoSuchLevel(usize),

    /// Loading an existing dataset failed because its directory layout or
    /// index could not be recognized.
    #[error("failed to load dataset at {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// The writer thread recorded a prior I/O error; every subsequent write
    /// fails fast with it attached.
    #[error("a previous write failed: {0}")]
    PoisonedByPriorError(String),

    /// The writer thread is gone (panicked or was dropped without a clean
    /// `finishedWriting`).
    #[error("writer thread is no longer running")]
    WriterGone,
}

impl StorageError {
    /// True for errors that mean "this future will never resolve to success
    /// again" — used by [`crate::writer_thread::WriteQueue`] to decide
    /// whether to latch the shared error slot.
    pub fn is_fatal_for_writer(&self) -> bool {
        matches!(
            self,
            StorageError::Io(_) | StorageError::Container(_) | StorageError::WriterGone
        )
    }
}
