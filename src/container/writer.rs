//! Writes images into a single container file.
//!
//! One [`ContainerWriter`] per physical `..._NDTiffStack[_k].tif` file. A
//! resolution level rolls over to a new writer (and a new `_k` suffix) once
//! [`has_space_to_write`](ContainerWriter::has_space_to_write) says no. The
//! classic-TIFF IFD chain this produces is the same shape a reader would
//! walk backward from a finished file, just built forward as images
//! arrive.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::bufferpool::BufferPool;
use crate::container::header::{ByteOrder, ContainerHeader};
use crate::container::ifd::{tags, FieldType, IfdEntry};
use crate::error::IoError;
use crate::index::entry::{Compression, IndexEntry};
use crate::pixel::PixelType;

/// A container file is never allowed to grow past this size; a resolution
/// level rolls over to a new file instead.
pub const CONTAINER_SIZE_LIMIT_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// TIFF `ResolutionUnit` value for "centimeter".
const RESOLUTION_UNIT_CM: u32 = 3;
/// TIFF `Compression` value for "no compression".
const COMPRESSION_NONE: u32 = 1;

/// Everything a caller must supply to write one image.
pub struct ImageToWrite<'a> {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    /// Raw pixel bytes. For RGB images, 4 bytes/pixel in BGRA order (the
    /// layout produced by the demo image generator and by ImageJ's packed
    /// `ColorProcessor`); the writer repacks to 3-byte RGB on disk.
    pub pixels: &'a [u8],
    pub metadata_json: &'a [u8],
    /// Physical pixel size in micrometers, if known, used to populate the
    /// TIFF resolution tags. `None` yields a 1:1 resolution.
    pub pixel_size_um: Option<f64>,
}

/// Writes images sequentially into one container file, maintaining a
/// forward-linked chain of classic-TIFF IFDs.
pub struct ContainerWriter {
    file: File,
    path: PathBuf,
    byte_order: ByteOrder,
    position: u64,
    /// File offset of the "next IFD offset" field of the most recently
    /// written image, patched once another image follows it.
    last_ifd_next_ptr_offset: Option<u64>,
    /// Recycled pixel-repacking buffers, avoiding an allocation per image
    /// on the hot write path.
    buffer_pool: BufferPool,
}

impl ContainerWriter {
    /// Create a new container file at `path`, write its header, and
    /// preallocate it to the maximum container size (a sparse allocation on
    /// any filesystem with hole support).
    pub fn create(path: impl AsRef<Path>, summary_metadata: Vec<u8>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
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
        file.set_len(CONTAINER_SIZE_LIMIT_BYTES)
            .map_err(|e| IoError::Preallocate {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let header = ContainerHeader::new(summary_metadata);
        let encoded = header.encode();
        file.write_all_at(&encoded, 0).map_err(|e| IoError::Positional {
            path: path.display().to_string(),
            offset: 0,
            reason: e.to_string(),
        })?;

        Ok(Self {
            file,
            path,
            byte_order: header.byte_order,
            position: header.total_len() as u64,
            last_ifd_next_ptr_offset: None,
            buffer_pool: BufferPool::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current write cursor — also the byte length the file should be
    /// truncated to once finished.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether an image of the given pixel/metadata size would still fit
    /// under the container size limit.
    pub fn has_space_to_write(&self, pixel_bytes: u64, metadata_bytes: u64) -> bool {
        let budget = pixel_bytes + metadata_bytes + 512; // IFD + rational + padding headroom
        self.position + budget <= CONTAINER_SIZE_LIMIT_BYTES
    }

    /// Write one image, returning the [`IndexEntry`] describing where it
    /// landed (the caller is responsible for appending it to the index).
    pub fn write_image(&mut self, image: ImageToWrite<'_>, filename: String) -> Result<IndexEntry, IoError> {
        let stored_pixels = if image.pixel_type.is_rgb() {
            let mut buf = self.buffer_pool.get_large(image.pixels.len() / 4 * 3);
            bgra_to_packed_rgb_into(image.pixels, &mut buf);
            buf
        } else {
            let mut buf = self.buffer_pool.get_large(image.pixels.len());
            buf.copy_from_slice(image.pixels);
            buf
        };

        let pixel_offset = self.position;
        self.write_at(&stored_pixels)?;
        self.buffer_pool.recycle(stored_pixels);

        let metadata_offset = self.position;
        self.write_at(image.metadata_json)?;

        let samples_per_pixel = image.pixel_type.samples_per_pixel();
        let bits_per_sample_entry = if samples_per_pixel == 1 {
            IfdEntry::inline(
                self.byte_order,
                tags::BITS_PER_SAMPLE,
                FieldType::Short,
                &[image.pixel_type.bits_per_sample() as u32],
            )
        } else {
            let values: Vec<u8> = (0..samples_per_pixel)
                .flat_map(|_| self.byte_order.write_u16(image.pixel_type.bits_per_sample()))
                .collect();
            let offset = self.position;
            self.write_at(&values)?;
            IfdEntry::out_of_line(
                self.byte_order,
                tags::BITS_PER_SAMPLE,
                FieldType::Short,
                samples_per_pixel as u32,
                offset as u32,
            )
        };

        let (x_res, y_res) = resolution_rational(image.pixel_size_um);
        let rational_offset = self.position;
        let mut rational_bytes = Vec::with_capacity(16);
        rational_bytes.extend_from_slice(&self.byte_order.write_u32(x_res.0));
        rational_bytes.extend_from_slice(&self.byte_order.write_u32(x_res.1));
        rational_bytes.extend_from_slice(&self.byte_order.write_u32(y_res.0));
        rational_bytes.extend_from_slice(&self.byte_order.write_u32(y_res.1));
        self.write_at(&rational_bytes)?;

        let entries = [
            IfdEntry::inline(self.byte_order, tags::IMAGE_WIDTH, FieldType::Long, &[image.width]),
            IfdEntry::inline(self.byte_order, tags::IMAGE_LENGTH, FieldType::Long, &[image.height]),
            bits_per_sample_entry,
            IfdEntry::inline(self.byte_order, tags::COMPRESSION, FieldType::Short, &[COMPRESSION_NONE]),
            IfdEntry::inline(
                self.byte_order,
                tags::PHOTOMETRIC_INTERPRETATION,
                FieldType::Short,
                &[image.pixel_type.photometric_interpretation() as u32],
            ),
            IfdEntry::inline(
                self.byte_order,
                tags::STRIP_OFFSETS,
                FieldType::Long,
                &[pixel_offset as u32],
            ),
            IfdEntry::inline(
                self.byte_order,
                tags::SAMPLES_PER_PIXEL,
                FieldType::Short,
                &[samples_per_pixel as u32],
            ),
            IfdEntry::inline(self.byte_order, tags::ROWS_PER_STRIP, FieldType::Long, &[image.height]),
            IfdEntry::inline(
                self.byte_order,
                tags::STRIP_BYTE_COUNTS,
                FieldType::Long,
                &[stored_pixels.len() as u32],
            ),
            IfdEntry::out_of_line(self.byte_order, tags::X_RESOLUTION, FieldType::Rational, 1, rational_offset as u32),
            IfdEntry::out_of_line(
                self.byte_order,
                tags::Y_RESOLUTION,
                FieldType::Rational,
                1,
                (rational_offset + 8) as u32,
            ),
            IfdEntry::inline(
                self.byte_order,
                tags::RESOLUTION_UNIT,
                FieldType::Short,
                &[RESOLUTION_UNIT_CM],
            ),
            IfdEntry::inline(
                self.byte_order,
                tags::MM_METADATA,
                FieldType::Long,
                &[metadata_offset as u32],
            ),
        ];
        debug_assert_eq!(entries.len(), tags::ORDER.len());

        let ifd_offset = self.position;
        let mut ifd_bytes = Vec::with_capacity(2 + entries.len() * IfdEntry::ENCODED_SIZE + 4);
        ifd_bytes.extend_from_slice(&self.byte_order.write_u16(entries.len() as u16));
        for entry in &entries {
            ifd_bytes.extend_from_slice(&entry.encode(self.byte_order));
        }
        let next_ifd_field_offset = ifd_offset + ifd_bytes.len() as u64;
        ifd_bytes.extend_from_slice(&self.byte_order.write_u32(0));
        self.write_at(&ifd_bytes)?;

        if let Some(prev_field_offset) = self.last_ifd_next_ptr_offset {
            self.file
                .write_all_at(&self.byte_order.write_u32(ifd_offset as u32), prev_field_offset)
                .map_err(|e| IoError::Positional {
                    path: self.path.display().to_string(),
                    offset: prev_field_offset,
                    reason: e.to_string(),
                })?;
        }
        self.last_ifd_next_ptr_offset = Some(next_ifd_field_offset);

        Ok(IndexEntry {
            axes_key: String::new(), // filled in by the caller, who owns the coordinate
            filename,
            pixel_offset: pixel_offset as u32,
            pixel_width: image.width,
            pixel_height: image.height,
            pixel_type: image.pixel_type,
            pixel_compression: Compression::None,
            metadata_offset: metadata_offset as u32,
            metadata_length: image.metadata_json.len() as u32,
            metadata_compression: Compression::None,
        })
    }

    /// Terminate the IFD chain and shrink the file to the bytes actually
    /// used, undoing the speculative 4 GiB preallocation.
    pub fn finished_writing(&mut self) -> Result<(), IoError> {
        if let Some(field_offset) = self.last_ifd_next_ptr_offset.take() {
            self.file
                .write_all_at(&self.byte_order.write_u32(0), field_offset)
                .map_err(|e| IoError::Positional {
                    path: self.path.display().to_string(),
                    offset: field_offset,
                    reason: e.to_string(),
                })?;
        }
        self.file.set_len(self.position).map_err(|e| IoError::Filesystem {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.file.sync_all().map_err(|e| IoError::Filesystem {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Overwrite an already-written pixel payload in place, at the exact
    /// offset and length it was originally written with. Used to correct a
    /// just-acquired image (e.g. a live-preview frame later replaced by the
    /// final exposure) without disturbing anything else in the file.
    pub fn overwrite_pixels_at(&self, offset: u64, bytes: &[u8]) -> Result<(), IoError> {
        self.file.write_all_at(bytes, offset).map_err(|e| IoError::Positional {
            path: self.path.display().to_string(),
            offset,
            reason: e.to_string(),
        })
    }

    fn write_at(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.file
            .write_all_at(bytes, self.position)
            .map_err(|e| IoError::Positional {
                path: self.path.display().to_string(),
                offset: self.position,
                reason: e.to_string(),
            })?;
        self.position += bytes.len() as u64;
        Ok(())
    }
}

/// Repack 4-byte BGRA pixels into 3-byte packed RGB for on-disk storage,
/// writing into a caller-supplied (pool-sourced) destination buffer.
fn bgra_to_packed_rgb_into(bgra: &[u8], out: &mut [u8]) {
    for (i, px) in bgra.chunks_exact(4).enumerate() {
        out[i * 3] = px[2]; // R
        out[i * 3 + 1] = px[1]; // G
        out[i * 3 + 2] = px[0]; // B
    }
}

/// Derive an (numerator, denominator) TIFF rational expressing pixels per
/// centimeter from a pixel size in micrometers. Defaults to 1:1 when the
/// pixel size is unknown, matching a scanner with no calibration.
fn resolution_rational(pixel_size_um: Option<f64>) -> ((u32, u32), (u32, u32)) {
    match pixel_size_um {
        Some(um) if um > 0.0 => {
            let pixels_per_cm = 10_000.0 / um;
            let denominator = 1_000_000u32;
            let numerator = (pixels_per_cm * denominator as f64).round() as u32;
            (((numerator, denominator)), (numerator, denominator))
        }
        _ => ((1, 1), (1, 1)),
    }
}
