//! Reads images back out of a container file via positional reads against
//! the offsets recorded in an [`IndexEntry`] — no IFD chain walk required
//! for ordinary access, since the index already has everything a read
//! needs.

use crate::container::header::{ByteOrder, ContainerHeader};
use crate::error::ContainerError;
use crate::index::entry::IndexEntry;
use crate::io::{FileRange, LocalFile};
use crate::pixel::PixelType;

/// A decoded image's pixels, in the shape a caller actually wants them.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray8(Vec<u8>),
    /// Raw sample values for all non-8-bit monochrome depths (10/11/12/14/16
    /// bit); the caller is responsible for any bit-depth-specific scaling.
    Gray16(Vec<u16>),
    /// 4 bytes/pixel in BGRA order with alpha fixed at 255, matching the
    /// layout the writer accepts on the way in.
    Rgba8(Vec<u8>),
}

impl PixelBuffer {
    pub fn is_rgb(&self) -> bool {
        matches!(self, PixelBuffer::Rgba8(_))
    }
}

/// A fully decoded image plus its per-image JSON metadata.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelBuffer,
    pub metadata_json: Vec<u8>,
}

/// Read-only handle on one container file.
pub struct ContainerReader {
    file: LocalFile,
    byte_order: ByteOrder,
    summary_metadata: Vec<u8>,
}

impl ContainerReader {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ContainerError> {
        let file = LocalFile::open(path)?;
        let header_region = file.read_exact_at(0, std::cmp::min(4096, file.size() as usize))?;
        let header = ContainerHeader::parse(&header_region)?;
        Ok(Self {
            file,
            byte_order: header.byte_order,
            summary_metadata: header.summary_metadata,
        })
    }

    pub fn summary_metadata(&self) -> &[u8] {
        &self.summary_metadata
    }

    pub fn path(&self) -> &str {
        self.file.path()
    }

    /// Read just the metadata bytes for an entry, without touching pixels.
    pub fn read_metadata_bytes(&self, entry: &IndexEntry) -> Result<Vec<u8>, ContainerError> {
        Ok(self
            .file
            .read_exact_at(entry.metadata_offset as u64, entry.metadata_length as usize)?)
    }

    /// Read and decode the full pixel payload for an entry.
    pub fn read_image(&self, entry: &IndexEntry) -> Result<DecodedImage, ContainerError> {
        let raw = self
            .file
            .read_exact_at(entry.pixel_offset as u64, entry.pixel_byte_len() as usize)?;
        let metadata_json = self.read_metadata_bytes(entry)?;

        let pixels = match entry.pixel_type {
            PixelType::Gray8 => PixelBuffer::Gray8(raw),
            PixelType::Rgb8 => PixelBuffer::Rgba8(packed_rgb_to_bgra(&raw)),
            _ => PixelBuffer::Gray16(decode_u16_samples(&raw, self.byte_order)),
        };

        Ok(DecodedImage {
            width: entry.pixel_width,
            height: entry.pixel_height,
            pixels,
            metadata_json,
        })
    }
}

/// Expand 3-byte packed RGB into 4-byte BGRA with alpha fixed at 255 — the
/// inverse of the writer's `bgra_to_packed_rgb`.
fn packed_rgb_to_bgra(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        out.push(px[2]); // B
        out.push(px[1]); // G
        out.push(px[0]); // R
        out.push(255); // A
    }
    out
}

fn decode_u16_samples(bytes: &[u8], byte_order: ByteOrder) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| byte_order.read_u16(chunk))
        .collect()
}
