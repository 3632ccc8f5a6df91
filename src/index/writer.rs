//! Append-only `NDTiff.index` writer.
//!
//! Preallocates 25 MiB up front (amortizing the cost of growing the file
//! under a gigabyte-per-second write load) and truncates to the actual
//! bytes written on `finished_writing`. Mirrors the container writer's
//! preallocate-then-truncate lifecycle (`container::writer::ContainerWriter`).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::IoError;
use crate::index::entry::IndexEntry;

/// Bytes preallocated for a new `NDTiff.index` file.
pub const INDEX_PREALLOCATION_BYTES: u64 = 25 * 1024 * 1024;

/// Appends encoded [`IndexEntry`] records to `NDTiff.index`.
pub struct IndexWriter {
    file: File,
    path: PathBuf,
    position: u64,
}

impl IndexWriter {
    /// Create a new `NDTiff.index` in `dir`, preallocated.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = dir.as_ref().join("NDTiff.index");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| IoError::Filesystem {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        file.set_len(INDEX_PREALLOCATION_BYTES)
            .map_err(|e| IoError::Preallocate {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            file,
            path,
            position: 0,
        })
    }

    /// Append one encoded entry. Must be called only from the dataset's
    /// dedicated writer thread, same as the resolution level it backs.
    pub fn append(&mut self, entry: &IndexEntry) -> Result<(), IoError> {
        let bytes = entry.encode();
        self.file
            .write_all_at(&bytes, self.position)
            .map_err(|e| IoError::Positional {
                path: self.path.display().to_string(),
                offset: self.position,
                reason: e.to_string(),
            })?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Truncate the file to the bytes actually written. Called once, as
    /// part of the dataset-wide `finishedWriting` barrier.
    pub fn finished_writing(&mut self) -> Result<(), IoError> {
        self.file
            .set_len(self.position)
            .map_err(|e| IoError::Filesystem {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        self.file.sync_all().map_err(|e| IoError::Filesystem {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
