//! Container file header: the extended, NDTiff-flavored TIFF header that
//! occupies bytes 0..28+K of every `{prefix}_NDTiffStack[_k].tif` file.
//!
//! Byte order drives every subsequent multi-byte read, so it's parsed
//! before anything else touches the file.

use crate::error::ContainerError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le};

/// Discriminator distinguishing an NDTiff container from a legacy
/// multi-page TIFF (bytes 8-11).
pub const NDTIFF_DISCRIMINATOR: u32 = 483_729;

/// Summary-metadata header magic (bytes 20-23).
pub const SUMMARY_METADATA_MAGIC: u32 = 2_355_492;

/// Current major/minor version written by this engine.
pub const MAJOR_VERSION: u32 = 3;
pub const MINOR_VERSION: u32 = 3;

/// Fixed size of the header up to (but not including) the summary metadata
/// bytes: 2 (BOM) + 2 (magic 42) + 4 (first IFD offset) + 4 (discriminator)
/// + 4 (major) + 4 (minor) + 4 (summary-md magic) + 4 (summary-md length).
pub const HEADER_PREFIX_SIZE: usize = 28;

/// Byte order of a container file, chosen at creation time from the host's
/// native order and fixed for the life of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// The host's native byte order — this is what new containers are
    /// always written in.
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::LittleEndian;
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::BigEndian;

    pub fn bom_bytes(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => [0x49, 0x49], // "II"
            ByteOrder::BigEndian => [0x4D, 0x4D],    // "MM"
        }
    }

    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

/// Parsed container header.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub byte_order: ByteOrder,
    pub first_ifd_offset: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub summary_metadata: Vec<u8>,
}

impl ContainerHeader {
    /// Build a new header for a freshly created container, computing the
    /// first IFD offset from the summary metadata length (rounded up to an
    /// even byte, as classic TIFF requires for any offset).
    pub fn new(summary_metadata: Vec<u8>) -> Self {
        let unaligned = HEADER_PREFIX_SIZE + summary_metadata.len();
        let first_ifd_offset = round_up_even(unaligned) as u32;
        Self {
            byte_order: ByteOrder::NATIVE,
            first_ifd_offset,
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            summary_metadata,
        }
    }

    /// Total length of the header including summary metadata and the
    /// alignment pad byte, i.e. where the first IFD begins.
    pub fn total_len(&self) -> usize {
        self.first_ifd_offset as usize
    }

    /// Encode the header to bytes, ready to be written at file offset 0.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        out.extend_from_slice(&self.byte_order.bom_bytes());
        out.extend_from_slice(&self.byte_order.write_u16(42));
        out.extend_from_slice(&self.byte_order.write_u32(self.first_ifd_offset));
        out.extend_from_slice(&self.byte_order.write_u32(NDTIFF_DISCRIMINATOR));
        out.extend_from_slice(&self.byte_order.write_u32(self.major_version));
        out.extend_from_slice(&self.byte_order.write_u32(self.minor_version));
        out.extend_from_slice(&self.byte_order.write_u32(SUMMARY_METADATA_MAGIC));
        out.extend_from_slice(&self.byte_order.write_u32(self.summary_metadata.len() as u32));
        out.extend_from_slice(&self.summary_metadata);
        while out.len() < self.total_len() {
            out.push(0);
        }
        out
    }

    /// Parse a header from the start of a file.
    pub fn parse(bytes: &[u8]) -> Result<Self, ContainerError> {
        if bytes.len() < HEADER_PREFIX_SIZE {
            return Err(ContainerError::FileTooSmall {
                required: HEADER_PREFIX_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let bom = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match bom {
            0x4949 => ByteOrder::LittleEndian,
            0x4D4D => ByteOrder::BigEndian,
            other => return Err(ContainerError::InvalidByteOrderMark(other)),
        };

        let magic = byte_order.read_u16(&bytes[2..4]);
        if magic != 42 {
            return Err(ContainerError::InvalidMagic(magic));
        }

        let first_ifd_offset = byte_order.read_u32(&bytes[4..8]);
        let discriminator = byte_order.read_u32(&bytes[8..12]);
        if discriminator != NDTIFF_DISCRIMINATOR {
            return Err(ContainerError::NotNdTiff(discriminator));
        }
        let major_version = byte_order.read_u32(&bytes[12..16]);
        let minor_version = byte_order.read_u32(&bytes[16..20]);
        let md_magic = byte_order.read_u32(&bytes[20..24]);
        if md_magic != SUMMARY_METADATA_MAGIC {
            return Err(ContainerError::InvalidSummaryMetadataMagic(md_magic));
        }
        let md_len = byte_order.read_u32(&bytes[24..28]) as usize;

        if bytes.len() < HEADER_PREFIX_SIZE + md_len {
            return Err(ContainerError::FileTooSmall {
                required: (HEADER_PREFIX_SIZE + md_len) as u64,
                actual: bytes.len() as u64,
            });
        }
        let summary_metadata = bytes[HEADER_PREFIX_SIZE..HEADER_PREFIX_SIZE + md_len].to_vec();

        Ok(Self {
            byte_order,
            first_ifd_offset,
            major_version,
            minor_version,
            summary_metadata,
        })
    }
}

fn round_up_even(n: usize) -> usize {
    if n % 2 == 0 {
        n
    } else {
        n + 1
    }
}
