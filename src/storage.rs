//! `NdTiffStorage`: the top-level pyramid orchestrator.
//!
//! Owns every resolution level, the single writer thread that serializes
//! mutation across them, and the axis-type table that catches a coordinate
//! axis switching between integer and string use. Non-tiled datasets only
//! ever touch level 0; tiled datasets cascade each tile through
//! [`crate::stitch`]'s 2x2-averaging pyramid as it arrives.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::container::{DecodedImage, ImageToWrite};
use crate::coord::Coordinate;
use crate::error::StorageError;
use crate::level::{level_dir, ResolutionLevel};
use crate::pixel::PixelType;
use crate::stitch::{div_floor, read_stitched_region, StitchedImage};
use crate::writer_thread::WriteQueue;

/// Grid overlap, in pixels, between adjacent tiles of a tiled acquisition.
/// `None` (the default for [`NdTiffStorage::create`]) means a non-tiled
/// dataset: no overlap, no pyramid directory nesting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileOverlap {
    pub x: u32,
    pub y: u32,
}

/// Inject the engine's three reserved summary-metadata keys
/// (`GridPixelOverlapX`, `GridPixelOverlapY`, `TiledImageStorage`) into the
/// caller-supplied summary metadata, preserving whatever else is already
/// there. Falls back to an empty object if `raw` is empty, unparseable, or
/// not a JSON object — the reserved keys still get written, just with
/// nothing else alongside them.
fn annotate_summary_metadata(raw: &[u8], overlap: TileOverlap, tiled: bool) -> Vec<u8> {
    let mut map = if raw.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_slice::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    };
    map.insert("GridPixelOverlapX".to_string(), serde_json::Value::from(overlap.x));
    map.insert("GridPixelOverlapY".to_string(), serde_json::Value::from(overlap.y));
    map.insert("TiledImageStorage".to_string(), serde_json::Value::from(tiled));
    serde_json::to_vec(&serde_json::Value::Object(map)).unwrap_or_default()
}

/// An owned, 'static copy of the data needed to write one image — the
/// writer thread runs on its own thread, so a write job can't borrow from
/// the caller's stack.
#[derive(Clone)]
pub struct OwnedImage {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    /// Same convention as [`crate::container::ImageToWrite::pixels`]: BGRA
    /// for RGB images, raw native-order samples otherwise.
    pub pixels: Vec<u8>,
    pub metadata_json: Vec<u8>,
    pub pixel_size_um: Option<f64>,
}

impl OwnedImage {
    /// Build an image from a caller-reported bit depth and RGB flag rather
    /// than a [`PixelType`] directly, failing instead of silently writing
    /// the wrong pixel format. 16-bit RGB is rejected with
    /// [`StorageError::Rgb16NotSupported`]; any other bit depth with no
    /// matching pixel type is rejected with
    /// [`StorageError::UnsupportedBitDepth`].
    pub fn from_bit_depth(
        width: u32,
        height: u32,
        bit_depth: u32,
        rgb: bool,
        pixels: Vec<u8>,
        metadata_json: Vec<u8>,
        pixel_size_um: Option<f64>,
    ) -> Result<Self, StorageError> {
        let pixel_type = PixelType::from_bit_depth(bit_depth, rgb).ok_or_else(|| {
            if rgb && bit_depth == 16 {
                StorageError::Rgb16NotSupported
            } else {
                StorageError::UnsupportedBitDepth { bit_depth, rgb }
            }
        })?;
        Ok(Self {
            width,
            height,
            pixel_type,
            pixels,
            metadata_json,
            pixel_size_um,
        })
    }

    fn as_borrowed(&self) -> ImageToWrite<'_> {
        ImageToWrite {
            width: self.width,
            height: self.height,
            pixel_type: self.pixel_type,
            pixels: &self.pixels,
            metadata_json: &self.metadata_json,
            pixel_size_um: self.pixel_size_um,
        }
    }
}

/// A parent tile being assembled from up to four downsampled children.
/// Missing quadrants stay zero (background fill), same policy as the
/// stitched reader.
struct PendingQuadrant {
    base: Coordinate,
    buffer: Vec<u8>,
    tile_width: u32,
    tile_height: u32,
    received: [[bool; 2]; 2],
    pixel_type: PixelType,
    metadata_json: Vec<u8>,
}

impl PendingQuadrant {
    fn new(base: Coordinate, tile_width: u32, tile_height: u32, pixel_type: PixelType, metadata_json: Vec<u8>) -> Self {
        let stride = stride_for(pixel_type);
        Self {
            base,
            buffer: vec![0u8; (tile_width * tile_height) as usize * stride],
            tile_width,
            tile_height,
            received: [[false; 2]; 2],
            pixel_type,
            metadata_json,
        }
    }

    fn place(&mut self, quad_row: usize, quad_col: usize, data: &[u8]) {
        let stride = stride_for(self.pixel_type);
        let half_w = self.tile_width / 2;
        let half_h = self.tile_height / 2;
        for y in 0..half_h {
            let dst_row = quad_row as u32 * half_h + y;
            let dst_start = (dst_row * self.tile_width + quad_col as u32 * half_w) as usize * stride;
            let src_start = (y * half_w) as usize * stride;
            let len = half_w as usize * stride;
            self.buffer[dst_start..dst_start + len].copy_from_slice(&data[src_start..src_start + len]);
        }
        self.received[quad_row][quad_col] = true;
    }

    fn is_complete(&self) -> bool {
        self.received.iter().flatten().all(|&b| b)
    }
}

fn stride_for(pixel_type: PixelType) -> usize {
    if pixel_type.is_rgb() {
        4
    } else {
        pixel_type.byte_depth() as usize
    }
}

fn read_native(bytes: &[u8]) -> u32 {
    if bytes.len() == 1 {
        bytes[0] as u32
    } else {
        u16::from_ne_bytes([bytes[0], bytes[1]]) as u32
    }
}

fn write_native(out: &mut [u8], value: u32, byte_depth: usize) {
    if byte_depth == 1 {
        out[0] = value as u8;
    } else {
        out[0..2].copy_from_slice(&(value as u16).to_ne_bytes());
    }
}

/// Downsample one tile by 2x2 box averaging. Operates on the same
/// BGRA-for-RGB / native-samples-otherwise convention as [`OwnedImage`].
///
/// `src_stride` is the row width of `pixels` (the full raw tile width at
/// level 0, or the content width at level >= 1); `content_width`/
/// `content_height` is the region of `pixels` actually averaged (the full
/// tile at level >= 1, or the tile minus its overlap margin at level 0);
/// `offset_x`/`offset_y` shifts the averaging window's top-left corner
/// within `pixels` — `(xOverlap/2, yOverlap/2)` when downsampling from
/// level 0, zero otherwise, so the overlap margin never contributes to a
/// coarser level's pixels.
fn downsample_2x2(
    pixels: &[u8],
    src_stride: u32,
    content_width: u32,
    content_height: u32,
    offset_x: u32,
    offset_y: u32,
    pixel_type: PixelType,
) -> Vec<u8> {
    let out_w = content_width / 2;
    let out_h = content_height / 2;
    let byte_depth = pixel_type.byte_depth() as usize;
    let channels = if pixel_type.is_rgb() { 3 } else { 1 };
    let stride = stride_for(pixel_type);
    let mut out = vec![0u8; (out_w * out_h) as usize * stride];

    for oy in 0..out_h {
        for ox in 0..out_w {
            for c in 0..channels {
                let mut sum = 0u32;
                for dy in 0..2u32 {
                    for dx in 0..2u32 {
                        let sx = offset_x + ox * 2 + dx;
                        let sy = offset_y + oy * 2 + dy;
                        let byte_index = (sy * src_stride + sx) as usize * stride + c * byte_depth;
                        sum += read_native(&pixels[byte_index..byte_index + byte_depth]);
                    }
                }
                let avg = sum / 4;
                let out_index = (oy * out_w + ox) as usize * stride + c * byte_depth;
                write_native(&mut out[out_index..out_index + byte_depth], avg, byte_depth);
            }
            if pixel_type.is_rgb() {
                out[(oy * out_w + ox) as usize * stride + 3] = 255;
            }
        }
    }
    out
}

/// Filename of the optional, opaque display-settings sidecar.
const DISPLAY_SETTINGS_FILENAME: &str = "display_settings.txt";

/// Mutable dataset state, owned exclusively by the writer thread.
struct DatasetState {
    dir: PathBuf,
    prefix: String,
    levels: Vec<ResolutionLevel>,
    tile_width: u32,
    tile_height: u32,
    axis_types: HashMap<String, &'static str>,
    pending: Vec<HashMap<(String, i32, i32), PendingQuadrant>>,
    finished: bool,
    /// Opaque JSON, never interpreted by the engine. Written to
    /// `display_settings.txt` on finish if set.
    display_settings: Option<Vec<u8>>,
    /// Whether this dataset uses the tiled pyramid directory layout
    /// (`Full resolution/`, `Downsampled_x{2^k}/`) rather than the flat
    /// non-tiled layout.
    tiled: bool,
    overlap_x: u32,
    overlap_y: u32,
    /// The (already reserved-key-annotated) summary metadata every level's
    /// container files are created with.
    summary_metadata: Vec<u8>,
}

impl DatasetState {
    /// Tile width actually written into the index/container at `level`:
    /// the full raw tile at level 0 (overlap included), the overlap-free
    /// content size from level 1 up (constant across every coarser level).
    fn level_tile_dims(&self, level_index: usize) -> (u32, u32) {
        if level_index == 0 {
            (self.tile_width, self.tile_height)
        } else {
            (self.content_width(), self.content_height())
        }
    }

    fn content_width(&self) -> u32 {
        self.tile_width.saturating_sub(self.overlap_x)
    }

    fn content_height(&self) -> u32 {
        self.tile_height.saturating_sub(self.overlap_y)
    }

    fn check_axis_types(&mut self, coordinate: &Coordinate) -> Result<(), StorageError> {
        for (axis, value) in coordinate.iter() {
            let kind = value.kind_name();
            match self.axis_types.get(axis.as_str()) {
                Some(existing) if *existing != kind => {
                    return Err(StorageError::AxisTypeConflict {
                        axis: axis.clone(),
                        expected: existing,
                        actual: kind,
                    })
                }
                Some(_) => {}
                None => {
                    self.axis_types.insert(axis.clone(), kind);
                }
            }
        }
        Ok(())
    }

    fn ensure_level(&mut self, level_index: usize) -> Result<(), StorageError> {
        while self.levels.len() <= level_index {
            let next_index = self.levels.len();
            self.levels.push(ResolutionLevel::create(
                &self.dir,
                &self.prefix,
                next_index,
                self.summary_metadata.clone(),
                self.tiled,
            )?);
        }
        Ok(())
    }

    fn put_image(&mut self, coordinate: Coordinate, image: OwnedImage) -> Result<(), StorageError> {
        if self.finished {
            return Err(StorageError::DatasetFinished);
        }
        self.check_axis_types(&coordinate)?;
        self.ensure_level(0)?;
        self.levels[0].put_image(&coordinate, image.as_borrowed())
    }

    fn put_tile(&mut self, base: Coordinate, row: i32, col: i32, image: OwnedImage) -> Result<(), StorageError> {
        if self.finished {
            return Err(StorageError::DatasetFinished);
        }
        self.tile_width = image.width;
        self.tile_height = image.height;
        self.put_tile_at(0, &base, row, col, &image.pixels, image.pixel_type, &image.metadata_json, image.pixel_size_um)
    }

    fn put_tile_at(
        &mut self,
        level_index: usize,
        base: &Coordinate,
        row: i32,
        col: i32,
        pixels: &[u8],
        pixel_type: PixelType,
        metadata_json: &[u8],
        pixel_size_um: Option<f64>,
    ) -> Result<(), StorageError> {
        self.ensure_level(level_index)?;
        let coordinate = base.with_axis("row", row).with_axis("column", col);
        self.check_axis_types(&coordinate)?;
        let (width, height) = self.level_tile_dims(level_index);
        self.levels[level_index].put_image(
            &coordinate,
            ImageToWrite {
                width,
                height,
                pixel_type,
                pixels,
                metadata_json,
                pixel_size_um,
            },
        )?;

        let parent_row = div_floor(row as i64, 2) as i32;
        let parent_col = div_floor(col as i64, 2) as i32;
        let quad_row = (row - 2 * parent_row) as usize;
        let quad_col = (col - 2 * parent_col) as usize;

        let content_width = self.content_width();
        let content_height = self.content_height();
        let (src_stride, offset_x, offset_y) = if level_index == 0 {
            (self.tile_width, self.overlap_x / 2, self.overlap_y / 2)
        } else {
            (content_width, 0, 0)
        };
        let downsampled = downsample_2x2(
            pixels,
            src_stride,
            content_width,
            content_height,
            offset_x,
            offset_y,
            pixel_type,
        );

        while self.pending.len() <= level_index {
            self.pending.push(HashMap::new());
        }
        let key = (base.serialize(), parent_row, parent_col);
        let entry = self.pending[level_index].entry(key.clone()).or_insert_with(|| {
            PendingQuadrant::new(base.clone(), content_width, content_height, pixel_type, metadata_json.to_vec())
        });
        entry.place(quad_row, quad_col, &downsampled);

        if entry.is_complete() {
            let completed = self.pending[level_index].remove(&key).unwrap();
            self.put_tile_at(
                level_index + 1,
                &completed.base,
                parent_row,
                parent_col,
                &completed.buffer,
                completed.pixel_type,
                &completed.metadata_json,
                None,
            )?;
        }
        Ok(())
    }

    fn set_display_settings(&mut self, bytes: Vec<u8>) -> Result<(), StorageError> {
        if self.finished {
            return Err(StorageError::DatasetFinished);
        }
        self.display_settings = Some(bytes);
        Ok(())
    }

    /// Flush every still-pending parent tile (missing quadrants left at
    /// zero) and close out every level's files.
    fn finish(&mut self) -> Result<(), StorageError> {
        if self.finished {
            return Ok(());
        }
        // Only flush the levels that had pending data when finishing began —
        // flushing a partial tile up cascades one more (necessarily even
        // more partial) pending entry onto the next level, which is left
        // unpublished rather than chased indefinitely.
        let original_pending_levels = self.pending.len();
        for level_index in 0..original_pending_levels {
            let keys: Vec<_> = self.pending[level_index].keys().cloned().collect();
            for key in keys {
                if let Some(completed) = self.pending[level_index].remove(&key) {
                    self.put_tile_at(
                        level_index + 1,
                        &completed.base,
                        key.1,
                        key.2,
                        &completed.buffer,
                        completed.pixel_type,
                        &completed.metadata_json,
                        None,
                    )?;
                }
            }
        }
        for level in &mut self.levels {
            level.finished_writing()?;
        }
        if let Some(bytes) = &self.display_settings {
            std::fs::write(self.dir.join(DISPLAY_SETTINGS_FILENAME), bytes).map_err(|e| {
                StorageError::LoadFailed {
                    path: self.dir.join(DISPLAY_SETTINGS_FILENAME).display().to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        self.finished = true;
        Ok(())
    }
}

/// A dataset: a pyramid of resolution levels backed by one directory on
/// disk, writes serialized through a single dedicated thread.
pub struct NdTiffStorage {
    queue: WriteQueue<DatasetState>,
}

impl NdTiffStorage {
    /// Create a brand-new, empty dataset. `tile_overlap` is `Some` for a
    /// tiled acquisition (selecting the `Full resolution/`/
    /// `Downsampled_x{2^k}/` pyramid directory layout and recording
    /// `GridPixelOverlapX`/`GridPixelOverlapY`/`TiledImageStorage` in the
    /// summary metadata) or `None` for a non-tiled dataset (flat layout,
    /// zero overlap).
    pub fn create(
        dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        summary_metadata: Vec<u8>,
        tile_overlap: Option<TileOverlap>,
    ) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::LoadFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let prefix = prefix.into();
        let tiled = tile_overlap.is_some();
        let overlap = tile_overlap.unwrap_or_default();
        let summary_metadata = annotate_summary_metadata(&summary_metadata, overlap, tiled);
        let level0 = ResolutionLevel::create(&dir, &prefix, 0, summary_metadata.clone(), tiled)?;
        let state = DatasetState {
            dir,
            prefix,
            levels: vec![level0],
            tile_width: 0,
            tile_height: 0,
            axis_types: HashMap::new(),
            pending: Vec::new(),
            finished: false,
            display_settings: None,
            tiled,
            overlap_x: overlap.x,
            overlap_y: overlap.y,
            summary_metadata,
        };
        Ok(Self {
            queue: WriteQueue::spawn(state),
        })
    }

    /// Load an existing, finished dataset for reading. Recognizes both the
    /// tiled layout (`Full resolution/NDTiff.index` for level 0,
    /// `Downsampled_x{2^k}/` for coarser levels) and the flat, non-tiled
    /// layout (`NDTiff.index` directly under `dir`, no levels above it).
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        let tiled_root = dir.join("Full resolution");
        let (level0_dir, level_root, tiled) = if tiled_root.join("NDTiff.index").is_file() {
            (tiled_root, dir.clone(), true)
        } else if dir.join("NDTiff.index").is_file() {
            (dir.clone(), dir.clone(), false)
        } else {
            return Err(StorageError::LoadFailed {
                path: dir.display().to_string(),
                reason: "no NDTiff.index found at dataset root or Full resolution/".to_string(),
            });
        };

        let mut levels = vec![ResolutionLevel::open_existing_in_dir(level0_dir, 0)?];
        let mut next = 1usize;
        loop {
            let candidate = level_dir(&level_root, next, tiled);
            if candidate.join("NDTiff.index").is_file() {
                levels.push(ResolutionLevel::open_existing_in_dir(candidate, next)?);
                next += 1;
            } else {
                break;
            }
        }

        let display_settings = std::fs::read(dir.join(DISPLAY_SETTINGS_FILENAME)).ok();

        let state = DatasetState {
            dir,
            prefix: String::new(),
            levels,
            tile_width: 0,
            tile_height: 0,
            axis_types: HashMap::new(),
            pending: Vec::new(),
            finished: true,
            display_settings,
            tiled,
            overlap_x: 0,
            overlap_y: 0,
            summary_metadata: Vec::new(),
        };
        Ok(Self {
            queue: WriteQueue::spawn(state),
        })
    }

    /// Write a single, non-tiled image at `coordinate`.
    pub fn put_image(&self, coordinate: Coordinate, image: OwnedImage) -> Result<(), StorageError> {
        let receiver = self.queue.submit(move |state| state.put_image(coordinate, image))?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)?
    }

    /// Write one tile of a tiled acquisition, cascading it through the
    /// resolution pyramid as 2x2 quadrants complete.
    pub fn put_tile(&self, base_coordinate: Coordinate, row: i32, col: i32, image: OwnedImage) -> Result<(), StorageError> {
        let receiver = self
            .queue
            .submit(move |state| state.put_tile(base_coordinate, row, col, image))?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)?
    }

    /// Pre-create empty resolution levels up to (and including) `max_level`,
    /// so a reader inspecting the dataset mid-acquisition sees the full
    /// intended depth even before every level has received a tile.
    pub fn increase_max_resolution_level(&self, max_level: usize) -> Result<(), StorageError> {
        let receiver = self.queue.submit(move |state| state.ensure_level(max_level))?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)?
    }

    /// Set the opaque display-settings blob, written to
    /// `display_settings.txt` when the dataset finishes. Never interpreted
    /// by the engine itself.
    pub fn set_display_settings(&self, bytes: Vec<u8>) -> Result<(), StorageError> {
        let receiver = self.queue.submit(move |state| state.set_display_settings(bytes))?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)?
    }

    /// Read back the display-settings blob, if one was ever set and the
    /// dataset has been finished (or loaded from a finished one).
    pub fn display_settings(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let slot: Arc<Mutex<Option<Option<Vec<u8>>>>> = Arc::new(Mutex::new(None));
        let slot_for_job = slot.clone();
        let receiver = self.queue.submit(move |state| {
            *slot_for_job.lock().unwrap() = Some(state.display_settings.clone());
            Ok(())
        })?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)??;
        Ok(slot.lock().unwrap().take().unwrap())
    }

    /// Flush all pending pyramid tiles and finalize every level's files.
    pub fn finished_writing(&self) -> Result<(), StorageError> {
        let receiver = self.queue.submit(|state| state.finish())?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)?
    }

    /// Read one image back by resolution level and coordinate.
    pub fn get_image(&self, level: usize, coordinate: Coordinate) -> Result<Option<DecodedImage>, StorageError> {
        let slot: Arc<Mutex<Option<Result<Option<DecodedImage>, StorageError>>>> = Arc::new(Mutex::new(None));
        let slot_for_job = slot.clone();
        let receiver = self.queue.submit(move |state| {
            let result = match state.levels.get(level) {
                Some(lvl) => lvl.get_image(&coordinate).map_err(StorageError::from),
                None => Err(StorageError::NoSuchLevel(level)),
            };
            *slot_for_job.lock().unwrap() = Some(result);
            Ok(())
        })?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)??;
        slot.lock().unwrap().take().unwrap()
    }

    /// Read a stitched window at `level`, assembled out of however many
    /// tiles at `base_coordinate` (with `row`/`column` varied) cover it.
    pub fn get_display_image(
        &self,
        level: usize,
        base_coordinate: Coordinate,
        tile_width: u32,
        tile_height: u32,
        overlap: u32,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<StitchedImage, StorageError> {
        let slot: Arc<Mutex<Option<Result<StitchedImage, StorageError>>>> = Arc::new(Mutex::new(None));
        let slot_for_job = slot.clone();
        let receiver = self.queue.submit(move |state| {
            let result = match state.levels.get(level) {
                Some(lvl) => read_stitched_region(lvl, &base_coordinate, tile_width, tile_height, overlap, x, y, width, height),
                None => Err(StorageError::NoSuchLevel(level)),
            };
            *slot_for_job.lock().unwrap() = Some(result);
            Ok(())
        })?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)??;
        slot.lock().unwrap().take().unwrap()
    }

    /// Number of images currently stored at `level`.
    pub fn image_count(&self, level: usize) -> Result<usize, StorageError> {
        let slot: Arc<Mutex<Option<usize>>> = Arc::new(Mutex::new(None));
        let slot_for_job = slot.clone();
        let receiver = self.queue.submit(move |state| {
            let count = state.levels.get(level).map(|lvl| lvl.image_count()).unwrap_or(0);
            *slot_for_job.lock().unwrap() = Some(count);
            Ok(())
        })?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)??;
        Ok(slot.lock().unwrap().take().unwrap())
    }

    /// Number of resolution levels currently materialized.
    pub fn level_count(&self) -> Result<usize, StorageError> {
        let slot: Arc<Mutex<Option<usize>>> = Arc::new(Mutex::new(None));
        let slot_for_job = slot.clone();
        let receiver = self.queue.submit(move |state| {
            *slot_for_job.lock().unwrap() = Some(state.levels.len());
            Ok(())
        })?;
        receiver.blocking_recv().map_err(|_| StorageError::WriterGone)??;
        Ok(slot.lock().unwrap().take().unwrap())
    }
}
