//! `NDTiff.index` record codec.
//!
//! One [`IndexEntry`] per image, schema fixed by the design: a length-
//! prefixed axes key, a length-prefixed filename, then nine native-byte-
//! order `u32` fields. This is the record the resolution level keeps one of
//! per coordinate, and the only thing a reader needs (plus a `pread`) to
//! serve an image.

use crate::error::CodecError;
use crate::io::{read_u32_ne, write_u32_ne};
use crate::pixel::PixelType;

/// Compression code for pixels/metadata. The engine never writes anything
/// but `None` — compression is explicitly out of scope — but the field
/// exists on disk so a reader must still decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None = 0,
}

impl Compression {
    fn from_u32(value: u32) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Compression::None),
            other => Err(CodecError::MalformedIndexEntry(format!(
                "unsupported compression code {other}"
            ))),
        }
    }
}

/// One `NDTiff.index` record: everything needed to locate and interpret an
/// image without touching its container file beyond a single `pread`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Canonical, sorted-key JSON coordinate (the lookup key).
    pub axes_key: String,
    /// Basename of the container file inside the resolution-level directory.
    pub filename: String,
    pub pixel_offset: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_type: PixelType,
    pub pixel_compression: Compression,
    pub metadata_offset: u32,
    pub metadata_length: u32,
    pub metadata_compression: Compression,
}

impl IndexEntry {
    /// Byte depth implied by `pixel_type` (1 or 2).
    pub fn byte_depth(&self) -> u32 {
        self.pixel_type.byte_depth()
    }

    /// On-disk pixel payload length in bytes.
    pub fn pixel_byte_len(&self) -> u32 {
        self.pixel_width * self.pixel_height * self.byte_depth() * if self.pixel_type.is_rgb() { 3 } else { 1 }
    }

    /// Encode this entry to its binary record form.
    pub fn encode(&self) -> Vec<u8> {
        let axes_bytes = self.axes_key.as_bytes();
        let filename_bytes = self.filename.as_bytes();

        let mut out = Vec::with_capacity(8 + axes_bytes.len() + filename_bytes.len() + 9 * 4);
        out.extend_from_slice(&write_u32_ne(axes_bytes.len() as u32));
        out.extend_from_slice(axes_bytes);
        out.extend_from_slice(&write_u32_ne(filename_bytes.len() as u32));
        out.extend_from_slice(filename_bytes);
        out.extend_from_slice(&write_u32_ne(self.pixel_offset));
        out.extend_from_slice(&write_u32_ne(self.pixel_width));
        out.extend_from_slice(&write_u32_ne(self.pixel_height));
        out.extend_from_slice(&write_u32_ne(self.pixel_type.as_u32()));
        out.extend_from_slice(&write_u32_ne(self.pixel_compression as u32));
        out.extend_from_slice(&write_u32_ne(self.metadata_offset));
        out.extend_from_slice(&write_u32_ne(self.metadata_length));
        out.extend_from_slice(&write_u32_ne(self.metadata_compression as u32));
        out
    }

    /// Decode one record starting at `buf[0..]`. Returns the entry and the
    /// number of bytes consumed, so callers can stream through a file.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut pos = 0usize;
        let axes_len = read_u32_field(buf, &mut pos)? as usize;
        let axes_key = read_string_field(buf, &mut pos, axes_len)?;
        let filename_len = read_u32_field(buf, &mut pos)? as usize;
        let filename = read_string_field(buf, &mut pos, filename_len)?;

        let pixel_offset = read_u32_field(buf, &mut pos)?;
        let pixel_width = read_u32_field(buf, &mut pos)?;
        let pixel_height = read_u32_field(buf, &mut pos)?;
        let pixel_type_code = read_u32_field(buf, &mut pos)?;
        let pixel_compression_code = read_u32_field(buf, &mut pos)?;
        let metadata_offset = read_u32_field(buf, &mut pos)?;
        let metadata_length = read_u32_field(buf, &mut pos)?;
        let metadata_compression_code = read_u32_field(buf, &mut pos)?;

        let pixel_type = PixelType::from_u32(pixel_type_code)
            .ok_or_else(|| CodecError::MalformedIndexEntry(format!("unknown pixel type {pixel_type_code}")))?;

        Ok((
            IndexEntry {
                axes_key,
                filename,
                pixel_offset,
                pixel_width,
                pixel_height,
                pixel_type,
                pixel_compression: Compression::from_u32(pixel_compression_code)?,
                metadata_offset,
                metadata_length,
                metadata_compression: Compression::from_u32(metadata_compression_code)?,
            },
            pos,
        ))
    }
}

fn read_u32_field(buf: &[u8], pos: &mut usize) -> Result<u32, CodecError> {
    if *pos + 4 > buf.len() {
        return Err(CodecError::MalformedIndexEntry("truncated record".into()));
    }
    let v = read_u32_ne(&buf[*pos..*pos + 4]);
    *pos += 4;
    Ok(v)
}

fn read_string_field(buf: &[u8], pos: &mut usize, len: usize) -> Result<String, CodecError> {
    if *pos + len > buf.len() {
        return Err(CodecError::MalformedIndexEntry("truncated record".into()));
    }
    let s = std::str::from_utf8(&buf[*pos..*pos + len])
        .map_err(|e| CodecError::MalformedIndexEntry(e.to_string()))?
        .to_string();
    *pos += len;
    Ok(s)
}
