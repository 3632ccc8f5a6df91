//! A single resolution level: one pyramid tier's worth of container files,
//! its index, and the in-memory coordinate → entry map that makes lookups
//! O(1).
//!
//! An `Arc<RwLock<HashMap<..>>>` of lazily-opened handles guarding
//! on-disk state: a cache of opened container readers for one pyramid
//! tier, populated as coordinates are actually read.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::container::{ContainerReader, ContainerWriter, DecodedImage, ImageToWrite};
use crate::coord::Coordinate;
use crate::error::StorageError;
use crate::index::{read_index_map, IndexEntry, IndexWriter};

fn container_filename(prefix: &str, file_index: usize) -> String {
    if file_index == 0 {
        format!("{prefix}_NDTiffStack.tif")
    } else {
        format!("{prefix}_NDTiffStack_{file_index}.tif")
    }
}

/// One resolution level's directory: `{dataset}/` for level 0 in the flat
/// v3 layout (or `{dataset}/Full resolution/` when tiled),
/// `{dataset}/Downsampled_x{2^level}/` for every level above it.
pub struct ResolutionLevel {
    dir: PathBuf,
    prefix: String,
    level_index: usize,
    current_writer: Option<ContainerWriter>,
    file_index: usize,
    /// Readers for every file this level has ever produced or loaded,
    /// opened lazily and kept for the life of the level.
    readers: RwLock<HashMap<String, Arc<ContainerReader>>>,
    index_writer: Option<IndexWriter>,
    entries: RwLock<HashMap<String, IndexEntry>>,
    /// The summary metadata this level was created with, reused verbatim
    /// for every container file produced after a rollover.
    summary_metadata: Vec<u8>,
    finished: bool,
}

impl ResolutionLevel {
    /// Create a brand-new, empty resolution level.
    pub fn create(
        dataset_dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        level_index: usize,
        summary_metadata: Vec<u8>,
        tiled: bool,
    ) -> Result<Self, StorageError> {
        let dir = level_dir(dataset_dir.as_ref(), level_index, tiled);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::LoadFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let prefix = prefix.into();
        let first_file = dir.join(container_filename(&prefix, 0));
        let writer = ContainerWriter::create(&first_file, summary_metadata.clone())?;
        let index_writer = IndexWriter::create(&dir)?;

        Ok(Self {
            dir,
            prefix,
            level_index,
            current_writer: Some(writer),
            file_index: 0,
            readers: RwLock::new(HashMap::new()),
            index_writer: Some(index_writer),
            entries: RwLock::new(HashMap::new()),
            summary_metadata,
            finished: false,
        })
    }

    /// Open an existing, previously finished resolution level for reading.
    pub fn open_existing(dataset_dir: impl AsRef<Path>, level_index: usize, tiled: bool) -> Result<Self, StorageError> {
        Self::open_existing_in_dir(level_dir(dataset_dir.as_ref(), level_index, tiled), level_index)
    }

    /// As [`Self::open_existing`], but `dir` is the level's directory
    /// itself rather than one to derive it from — used when loading a
    /// legacy layout whose level-0 directory isn't the dataset root.
    pub fn open_existing_in_dir(dir: PathBuf, level_index: usize) -> Result<Self, StorageError> {
        let index_path = dir.join("NDTiff.index");
        let entries = read_index_map(&index_path).map_err(|e| StorageError::LoadFailed {
            path: index_path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            dir,
            prefix: String::new(),
            level_index,
            current_writer: None,
            file_index: 0,
            readers: RwLock::new(HashMap::new()),
            index_writer: None,
            entries: RwLock::new(entries),
            summary_metadata: Vec::new(),
            finished: true,
        })
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn image_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn has_coordinate(&self, coordinate: &Coordinate) -> bool {
        self.entries.read().unwrap().contains_key(&coordinate.serialize())
    }

    /// Write one image at `coordinate`, rolling over to a new container file
    /// first if the current one is too full.
    pub fn put_image(&mut self, coordinate: &Coordinate, image: ImageToWrite<'_>) -> Result<(), StorageError> {
        if self.finished {
            return Err(StorageError::DatasetFinished);
        }
        let pixel_bytes = image.pixels.len() as u64;
        let metadata_bytes = image.metadata_json.len() as u64;

        let needs_rollover = self
            .current_writer
            .as_ref()
            .map(|w| !w.has_space_to_write(pixel_bytes, metadata_bytes))
            .unwrap_or(true);
        if needs_rollover {
            self.roll_over()?;
        }

        let writer = self
            .current_writer
            .as_mut()
            .ok_or(StorageError::DatasetFinished)?;
        let filename = container_filename(&self.prefix, self.file_index);
        let mut entry = writer.write_image(image, filename)?;
        entry.axes_key = coordinate.serialize();

        self.index_writer
            .as_mut()
            .ok_or(StorageError::DatasetFinished)?
            .append(&entry)?;
        self.entries.write().unwrap().insert(entry.axes_key.clone(), entry);
        Ok(())
    }

    /// Overwrite the pixel payload of a previously written image. Only
    /// supported while that image's file is still the currently active
    /// writer — correcting an image in an already rolled-over file is not
    /// supported.
    pub fn overwrite_pixels(&mut self, coordinate: &Coordinate, pixels: &[u8]) -> Result<(), StorageError> {
        let key = coordinate.serialize();
        let entry = self
            .entries
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::LoadFailed {
                path: key.clone(),
                reason: "no such coordinate".to_string(),
            })?;
        if entry.pixel_byte_len() as usize != pixels.len() {
            return Err(StorageError::LoadFailed {
                path: key,
                reason: "overwrite pixel length does not match original".to_string(),
            });
        }
        let current_filename = container_filename(&self.prefix, self.file_index);
        if entry.filename != current_filename {
            return Err(StorageError::LoadFailed {
                path: key,
                reason: "cannot overwrite pixels in a rolled-over file".to_string(),
            });
        }
        let writer = self
            .current_writer
            .as_ref()
            .ok_or(StorageError::DatasetFinished)?;
        writer.overwrite_pixels_at(entry.pixel_offset as u64, pixels)?;
        Ok(())
    }

    /// Read one image back by coordinate.
    pub fn get_image(&self, coordinate: &Coordinate) -> Result<Option<DecodedImage>, StorageError> {
        let key = coordinate.serialize();
        let entry = match self.entries.read().unwrap().get(&key).cloned() {
            Some(e) => e,
            None => return Ok(None),
        };
        let reader = self.reader_for(&entry.filename)?;
        Ok(Some(reader.read_image(&entry)?))
    }

    pub fn entry_for(&self, coordinate: &Coordinate) -> Option<IndexEntry> {
        self.entries.read().unwrap().get(&coordinate.serialize()).cloned()
    }

    pub fn all_entries(&self) -> Vec<IndexEntry> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    fn reader_for(&self, filename: &str) -> Result<Arc<ContainerReader>, StorageError> {
        if let Some(reader) = self.readers.read().unwrap().get(filename) {
            return Ok(reader.clone());
        }
        let path = self.dir.join(filename);
        let reader = Arc::new(ContainerReader::open(&path)?);
        self.readers
            .write()
            .unwrap()
            .insert(filename.to_string(), reader.clone());
        Ok(reader)
    }

    fn roll_over(&mut self) -> Result<(), StorageError> {
        if let Some(mut writer) = self.current_writer.take() {
            writer.finished_writing()?;
        }
        self.file_index += 1;
        let path = self.dir.join(container_filename(&self.prefix, self.file_index));
        self.current_writer = Some(ContainerWriter::create(&path, self.summary_metadata.clone())?);
        Ok(())
    }

    /// Close out the level: finish the active container writer and
    /// truncate the index to its true size.
    pub fn finished_writing(&mut self) -> Result<(), StorageError> {
        if self.finished {
            return Ok(());
        }
        if let Some(mut writer) = self.current_writer.take() {
            writer.finished_writing()?;
        }
        if let Some(mut index_writer) = self.index_writer.take() {
            index_writer.finished_writing()?;
        }
        self.finished = true;
        Ok(())
    }
}

/// A resolution level's directory: for a tiled dataset, level 0 lives in
/// `Full resolution/` and level k>0 lives in `Downsampled_x{2^k}/`; for a
/// non-tiled (flat v3) dataset level 0 is the dataset root and there are no
/// levels above it.
pub fn level_dir(dataset_dir: &Path, level_index: usize, tiled: bool) -> PathBuf {
    if level_index == 0 {
        if tiled {
            dataset_dir.join("Full resolution")
        } else {
            dataset_dir.to_path_buf()
        }
    } else {
        dataset_dir.join(format!("Downsampled_x{}", 1usize << level_index))
    }
}

#[allow(dead_code)]
fn open_raw_file(path: &Path) -> std::io::Result<File> {
    File::open(path)
}
