//! Pixel type codes.
//!
//! One [`PixelType`] value per image, carried in every index entry and
//! used to pick byte depth, TIFF photometric interpretation, and the
//! in-memory pixel container on read. A numeric enum with
//! `from_u32`/`as_u32`/descriptive accessor methods, the same shape as the
//! rest of this engine's on-disk code tables.

/// Pixel type of a single image, matching the index-entry code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PixelType {
    Gray8 = 0,
    Gray16 = 1,
    Rgb8 = 2,
    Gray10 = 3,
    Gray12 = 4,
    Gray14 = 5,
    Gray11 = 6,
}

impl PixelType {
    /// Decode the pixel-type code used in the index entry schema.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(PixelType::Gray8),
            1 => Some(PixelType::Gray16),
            2 => Some(PixelType::Rgb8),
            3 => Some(PixelType::Gray10),
            4 => Some(PixelType::Gray12),
            5 => Some(PixelType::Gray14),
            6 => Some(PixelType::Gray11),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Select a pixel type from the bit depth reported by the caller and
    /// whether the image is RGB.
    ///
    /// 16-bit RGB is explicitly unsupported (Design Notes, open question
    /// 1): callers must reject it before reaching this point.
    pub fn from_bit_depth(bit_depth: u32, rgb: bool) -> Option<Self> {
        if rgb {
            return if bit_depth == 8 { Some(PixelType::Rgb8) } else { None };
        }
        match bit_depth {
            8 => Some(PixelType::Gray8),
            10 => Some(PixelType::Gray10),
            11 => Some(PixelType::Gray11),
            12 => Some(PixelType::Gray12),
            14 => Some(PixelType::Gray14),
            16 => Some(PixelType::Gray16),
            _ => None,
        }
    }

    /// Bytes on disk per pixel: 1 for 8-bit mono and RGB, 2 for everything
    /// else (10/11/12/14/16-bit mono are all stored as 2-byte samples).
    pub const fn byte_depth(self) -> u32 {
        match self {
            PixelType::Gray8 | PixelType::Rgb8 => 1,
            _ => 2,
        }
    }

    pub const fn is_rgb(self) -> bool {
        matches!(self, PixelType::Rgb8)
    }

    /// Samples per pixel (1 for monochrome, 3 for RGB), used when emitting
    /// the `SamplesPerPixel` IFD tag.
    pub const fn samples_per_pixel(self) -> u16 {
        if self.is_rgb() {
            3
        } else {
            1
        }
    }

    /// TIFF `PhotometricInterpretation` value: 1 for greyscale, 2 for RGB.
    pub const fn photometric_interpretation(self) -> u16 {
        if self.is_rgb() {
            2
        } else {
            1
        }
    }

    /// TIFF `BitsPerSample` value actually stored on disk for a single
    /// channel (the nominal bit depth for mono types; 8 for RGB channels).
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            PixelType::Gray8 | PixelType::Rgb8 => 8,
            PixelType::Gray10 => 10,
            PixelType::Gray11 => 11,
            PixelType::Gray12 => 12,
            PixelType::Gray14 => 14,
            PixelType::Gray16 => 16,
        }
    }
}
