//! Stitched sub-image reads: assembling an arbitrary pixel window out of
//! however many tiles it spans.
//!
//! Same level/scale math as deriving a Deep Zoom tile address from a
//! requested viewport, with the direction reversed: a requested viewport
//! (in stage pixel coordinates) is decomposed into the `(row, column)`
//! tile addresses that cover it, plus the exact sub-rectangle to copy out
//! of each one.

use crate::container::{DecodedImage, PixelBuffer};
use crate::coord::Coordinate;
use crate::error::StorageError;
use crate::level::ResolutionLevel;

/// The result of a stitched read: one flat image assembled from however
/// many tiles overlapped the requested window. Tiles with no data at all
/// leave their portion of the canvas at zero (background fill).
pub struct StitchedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelBuffer,
    /// Metadata copied from whichever overlapping tile is encountered
    /// first in row-major (row, then column) order — the stitched image
    /// has no single coordinate of its own to carry metadata under.
    pub metadata_json: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Gray8,
    Gray16,
    Rgba8,
}

impl Kind {
    fn of(buf: &PixelBuffer) -> Self {
        match buf {
            PixelBuffer::Gray8(_) => Kind::Gray8,
            PixelBuffer::Gray16(_) => Kind::Gray16,
            PixelBuffer::Rgba8(_) => Kind::Rgba8,
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            Kind::Gray8 => 1,
            Kind::Gray16 => 2,
            Kind::Rgba8 => 4,
        }
    }
}

fn to_raw_bytes(buf: &PixelBuffer) -> Vec<u8> {
    match buf {
        PixelBuffer::Gray8(v) => v.clone(),
        PixelBuffer::Rgba8(v) => v.clone(),
        PixelBuffer::Gray16(v) => v.iter().flat_map(|s| s.to_ne_bytes()).collect(),
    }
}

fn from_raw_bytes(bytes: Vec<u8>, kind: Kind) -> PixelBuffer {
    match kind {
        Kind::Gray8 => PixelBuffer::Gray8(bytes),
        Kind::Rgba8 => PixelBuffer::Rgba8(bytes),
        Kind::Gray16 => PixelBuffer::Gray16(bytes.chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]])).collect()),
    }
}

/// Floor division, correct for negative tile coordinates (stages can place
/// tiles left of or above the origin).
pub(crate) fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn invalid_overlap() -> StorageError {
    StorageError::LoadFailed {
        path: "stitch".to_string(),
        reason: "overlap is too large for the tile size".to_string(),
    }
}

/// Read the window `[x, x+width) x [y, y+height)` in stage pixel
/// coordinates, stitched together out of the tiles at `base_coordinate`
/// with the `row`/`column` axes varied.
///
/// `tile_width`/`tile_height`/`overlap` always describe the level-0 grid
/// geometry (the raw, overlap-including tile size acquired at full
/// resolution), regardless of which `level` is being read: content width is
/// `tileWidth - overlap` (a single subtraction, not per-edge), and the
/// overlap trim — offsetting the source read by `(overlap/2, overlap/2)` —
/// only applies at level 0, since tiles at every coarser level are already
/// overlap-free and stored at exactly the content size. Pass `overlap: 0`
/// for a dataset acquired without any tile overlap.
pub fn read_stitched_region(
    level: &ResolutionLevel,
    base_coordinate: &Coordinate,
    tile_width: u32,
    tile_height: u32,
    overlap: u32,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
) -> Result<StitchedImage, StorageError> {
    let is_level0 = level.level_index() == 0;
    let effective_overlap = if is_level0 { overlap } else { 0 };
    let content_w = tile_width.checked_sub(effective_overlap).filter(|&w| w > 0).ok_or_else(invalid_overlap)?;
    let content_h = tile_height.checked_sub(effective_overlap).filter(|&h| h > 0).ok_or_else(invalid_overlap)?;
    // The on-disk row-stride of a tile at this level: the raw level-0
    // tile_width when trimming still needs to happen, or the content width
    // itself once the overlap has already been excluded upstream.
    let raw_tile_w = if is_level0 { tile_width } else { content_w };
    let offset = (effective_overlap / 2) as i64;

    let col_start = div_floor(x, content_w as i64);
    let col_end = div_floor(x + width as i64 - 1, content_w as i64);
    let row_start = div_floor(y, content_h as i64);
    let row_end = div_floor(y + height as i64 - 1, content_h as i64);

    let mut kind: Option<Kind> = None;
    let mut canvas: Vec<u8> = Vec::new();
    let mut metadata_json: Vec<u8> = Vec::new();
    let mut any_tile_found = false;

    for row in row_start..=row_end {
        for col in col_start..=col_end {
            let tile_left = col * content_w as i64;
            let tile_top = row * content_h as i64;

            let win_left = x.max(tile_left);
            let win_right = (x + width as i64).min(tile_left + content_w as i64);
            let win_top = y.max(tile_top);
            let win_bottom = (y + height as i64).min(tile_top + content_h as i64);
            if win_left >= win_right || win_top >= win_bottom {
                continue;
            }

            let tile_coord = base_coordinate.with_axis("row", row as i32).with_axis("column", col as i32);
            let decoded: DecodedImage = match level.get_image(&tile_coord)? {
                Some(d) => d,
                None => continue,
            };

            let this_kind = Kind::of(&decoded.pixels);
            match kind {
                None => {
                    kind = Some(this_kind);
                    canvas = vec![0u8; width as usize * height as usize * this_kind.bytes_per_pixel()];
                }
                Some(k) if k == this_kind => {}
                Some(_) => return Err(StorageError::InconsistentTileType),
            }
            if !any_tile_found {
                metadata_json = decoded.metadata_json.clone();
                any_tile_found = true;
            }

            let bpp = this_kind.bytes_per_pixel();
            let raw = to_raw_bytes(&decoded.pixels);

            for gy in win_top..win_bottom {
                let tile_row = (gy - tile_top + offset) as usize;
                let dst_row = (gy - y) as usize;
                let dst_col_start = (win_left - x) as usize;
                let src_col_start = (win_left - tile_left + offset) as usize;
                let run_len = (win_right - win_left) as usize;

                let src_start = (tile_row * raw_tile_w as usize + src_col_start) * bpp;
                let dst_start = (dst_row * width as usize + dst_col_start) * bpp;
                let len = run_len * bpp;
                canvas[dst_start..dst_start + len].copy_from_slice(&raw[src_start..src_start + len]);
            }
        }
    }

    let kind = kind.ok_or_else(|| StorageError::LoadFailed {
        path: "stitch".to_string(),
        reason: "no tiles overlap the requested region".to_string(),
    })?;

    Ok(StitchedImage {
        width,
        height,
        pixels: from_raw_bytes(canvas, kind),
        metadata_json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ImageToWrite;
    use crate::pixel::PixelType;

    fn put_tile(level: &mut ResolutionLevel, row: i32, col: i32, fill: u8) {
        let coord = Coordinate::new().with_axis("row", row).with_axis("column", col);
        let pixels = vec![fill; 4 * 4];
        level
            .put_image(
                &coord,
                ImageToWrite {
                    width: 4,
                    height: 4,
                    pixel_type: PixelType::Gray8,
                    pixels: &pixels,
                    metadata_json: br#"{"tile":true}"#,
                    pixel_size_um: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_stitch_single_tile_no_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = ResolutionLevel::create(dir.path(), "p", 0, vec![], false).unwrap();
        put_tile(&mut level, 0, 0, 7);

        let stitched = read_stitched_region(&level, &Coordinate::new(), 4, 4, 0, 0, 0, 4, 4).unwrap();
        match stitched.pixels {
            PixelBuffer::Gray8(bytes) => assert!(bytes.iter().all(|&b| b == 7)),
            _ => panic!("expected gray8"),
        }
        level.finished_writing().unwrap();
    }

    /// A 10x10 tile whose pixels encode their own local `(row, col)` as
    /// `row * 10 + col`, so a stitched read that samples the wrong source
    /// offset is caught by value, not just by canvas size.
    fn put_gridded_tile(level: &mut ResolutionLevel, row: i32, col: i32) {
        let coord = Coordinate::new().with_axis("row", row).with_axis("column", col);
        let mut pixels = vec![0u8; 10 * 10];
        for local_row in 0..10u8 {
            for local_col in 0..10u8 {
                pixels[local_row as usize * 10 + local_col as usize] = local_row * 10 + local_col;
            }
        }
        level
            .put_image(
                &coord,
                ImageToWrite {
                    width: 10,
                    height: 10,
                    pixel_type: PixelType::Gray8,
                    pixels: &pixels,
                    metadata_json: br#"{"tile":true}"#,
                    pixel_size_um: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_stitch_trims_half_overlap_from_each_tile_edge() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = ResolutionLevel::create(dir.path(), "p", 0, vec![], false).unwrap();
        // tileWidth = tileHeight = 10, xOverlap = yOverlap = 2: content width
        // is 10 - 2 = 8, so a 2x2 tile grid stitches into a 16x16 image.
        for row in 0..2 {
            for col in 0..2 {
                put_gridded_tile(&mut level, row, col);
            }
        }

        let stitched = read_stitched_region(&level, &Coordinate::new(), 10, 10, 2, 0, 0, 16, 16).unwrap();
        match stitched.pixels {
            PixelBuffer::Gray8(bytes) => {
                assert_eq!(bytes.len(), 16 * 16);
                // Tile (0, 0)'s content starts at its local (1, 1) (half the
                // overlap trimmed off the top and left) and runs 8x8.
                assert_eq!(bytes[0], 1 * 10 + 1);
                assert_eq!(bytes[7], 1 * 10 + 8);
                assert_eq!(bytes[7 * 16], 8 * 10 + 1);
                // Tile (0, 1) starts at stitched column 8, still offset by
                // the same half-overlap trim within its own local grid.
                assert_eq!(bytes[8], 1 * 10 + 1);
                // Tile (1, 1) at stitched (8, 8).
                assert_eq!(bytes[8 * 16 + 8], 1 * 10 + 1);
            }
            _ => panic!("expected gray8"),
        }
        level.finished_writing().unwrap();
    }

    #[test]
    fn test_stitch_missing_tile_leaves_background() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = ResolutionLevel::create(dir.path(), "p", 0, vec![], false).unwrap();
        put_tile(&mut level, 0, 0, 9);
        // (0, 1) was never written.

        let stitched = read_stitched_region(&level, &Coordinate::new(), 4, 4, 0, 0, 0, 8, 4).unwrap();
        match stitched.pixels {
            PixelBuffer::Gray8(bytes) => {
                assert_eq!(bytes[0], 9);
                assert_eq!(bytes[4], 0); // background fill
            }
            _ => panic!("expected gray8"),
        }
        level.finished_writing().unwrap();
    }

    #[test]
    fn test_stitch_negative_tile_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = ResolutionLevel::create(dir.path(), "p", 0, vec![], false).unwrap();
        put_tile(&mut level, -1, -1, 3);

        let stitched = read_stitched_region(&level, &Coordinate::new(), 4, 4, 0, -4, -4, 4, 4).unwrap();
        match stitched.pixels {
            PixelBuffer::Gray8(bytes) => assert!(bytes.iter().all(|&b| b == 3)),
            _ => panic!("expected gray8"),
        }
        level.finished_writing().unwrap();
    }

    #[test]
    fn test_inconsistent_tile_types_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut level = ResolutionLevel::create(dir.path(), "p", 0, vec![], false).unwrap();
        put_tile(&mut level, 0, 0, 1);
        let rgb_coord = Coordinate::new().with_axis("row", 0).with_axis("column", 1);
        let rgb_pixels = vec![1u8; 4 * 4 * 4];
        level
            .put_image(
                &rgb_coord,
                ImageToWrite {
                    width: 4,
                    height: 4,
                    pixel_type: PixelType::Rgb8,
                    pixels: &rgb_pixels,
                    metadata_json: b"{}",
                    pixel_size_um: None,
                },
            )
            .unwrap();

        let result = read_stitched_region(&level, &Coordinate::new(), 4, 4, 0, 0, 0, 8, 4);
        assert!(matches!(result, Err(StorageError::InconsistentTileType)));
        level.finished_writing().unwrap();
    }
}
