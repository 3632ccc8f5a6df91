//! Image File Directory entries: the classic-TIFF tag/type/count/value
//! records that describe one image within a container.
//!
//! Fixed 12-byte-per-entry layout with the classic-TIFF inline-vs-offset
//! value rule, driven here by the fixed 13-tag set this engine always
//! writes rather than whatever tags a source TIFF happened to carry.

use crate::container::header::ByteOrder;
use crate::error::ContainerError;

/// TIFF field types this engine ever emits or reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Short,
    Long,
    Rational,
}

impl FieldType {
    pub const fn code(self) -> u16 {
        match self {
            FieldType::Short => 3,
            FieldType::Long => 4,
            FieldType::Rational => 5,
        }
    }

    pub const fn byte_size(self) -> u32 {
        match self {
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational => 8,
        }
    }
}

/// The 13 tags this engine writes for every image, in the ascending order
/// the format requires.
pub mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const X_RESOLUTION: u16 = 282;
    pub const Y_RESOLUTION: u16 = 283;
    pub const RESOLUTION_UNIT: u16 = 296;
    pub const MM_METADATA: u16 = 51123;

    /// The fixed tag order written into every IFD, ascending (TIFF requires
    /// entries be sorted by tag for readers that binary-search them).
    pub const ORDER: [u16; 13] = [
        IMAGE_WIDTH,
        IMAGE_LENGTH,
        BITS_PER_SAMPLE,
        COMPRESSION,
        PHOTOMETRIC_INTERPRETATION,
        STRIP_OFFSETS,
        SAMPLES_PER_PIXEL,
        ROWS_PER_STRIP,
        STRIP_BYTE_COUNTS,
        X_RESOLUTION,
        Y_RESOLUTION,
        RESOLUTION_UNIT,
        MM_METADATA,
    ];
}

/// A decoded or about-to-be-encoded IFD entry.
///
/// `value` holds up to 4 bytes of inline payload when `count * type size <=
/// 4`, or a little/big-endian (per the file's byte order) offset into the
/// file otherwise.
#[derive(Debug, Clone, Copy)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    pub value: [u8; 4],
}

impl IfdEntry {
    pub const ENCODED_SIZE: usize = 12;

    /// Build an entry whose value(s) fit inline (`count * size <= 4`).
    pub fn inline(byte_order: ByteOrder, tag: u16, field_type: FieldType, values: &[u32]) -> Self {
        debug_assert!(field_type.byte_size() as usize * values.len() <= 4);
        let mut value = [0u8; 4];
        let mut offset = 0usize;
        for &v in values {
            let encoded = match field_type {
                FieldType::Short => byte_order.write_u16(v as u16).to_vec(),
                FieldType::Long => byte_order.write_u32(v).to_vec(),
                FieldType::Rational => unreachable!("rational never fits inline"),
            };
            value[offset..offset + encoded.len()].copy_from_slice(&encoded);
            offset += encoded.len();
        }
        Self {
            tag,
            field_type,
            count: values.len() as u32,
            value,
        }
    }

    /// Build an entry whose value lives out-of-line at `data_offset`
    /// (used for `StripOffsets`/rationals/anything exceeding 4 bytes).
    pub fn out_of_line(byte_order: ByteOrder, tag: u16, field_type: FieldType, count: u32, data_offset: u32) -> Self {
        Self {
            tag,
            field_type,
            count,
            value: byte_order.write_u32(data_offset),
        }
    }

    pub fn encode(&self, byte_order: ByteOrder) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..2].copy_from_slice(&byte_order.write_u16(self.tag));
        out[2..4].copy_from_slice(&byte_order.write_u16(self.field_type.code()));
        out[4..8].copy_from_slice(&byte_order.write_u32(self.count));
        out[8..12].copy_from_slice(&self.value);
        out
    }

    pub fn decode(byte_order: ByteOrder, bytes: &[u8]) -> Result<Self, ContainerError> {
        if bytes.len() < Self::ENCODED_SIZE {
            return Err(ContainerError::FileTooSmall {
                required: Self::ENCODED_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }
        let tag = byte_order.read_u16(&bytes[0..2]);
        let type_code = byte_order.read_u16(&bytes[2..4]);
        let field_type = match type_code {
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            other => {
                return Err(ContainerError::Codec(crate::error::CodecError::MalformedIndexEntry(
                    format!("unknown IFD field type {other}"),
                )))
            }
        };
        let count = byte_order.read_u32(&bytes[4..8]);
        let mut value = [0u8; 4];
        value.copy_from_slice(&bytes[8..12]);
        Ok(Self {
            tag,
            field_type,
            count,
            value,
        })
    }

    /// Interpret this entry's inline value as a single `u32` (for Short or
    /// Long scalar fields).
    pub fn as_u32(&self, byte_order: ByteOrder) -> u32 {
        match self.field_type {
            FieldType::Short => byte_order.read_u16(&self.value[0..2]) as u32,
            FieldType::Long => byte_order.read_u32(&self.value[0..4]),
            FieldType::Rational => byte_order.read_u32(&self.value[0..4]),
        }
    }
}
