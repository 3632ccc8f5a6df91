//! A 2x2 grid of overlapping tiles reads back as one flat stitched image,
//! after a full finish/reload — not just while the writer handle that
//! produced them is still open.

use ndtiff::container::PixelBuffer;
use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

fn tile(fill: u8) -> OwnedImage {
    OwnedImage {
        width: 4,
        height: 4,
        pixel_type: PixelType::Gray8,
        pixels: vec![fill; 16],
        metadata_json: br#"{"tile":true}"#.to_vec(),
        pixel_size_um: None,
    }
}

#[test]
fn two_by_two_overlapping_tiles_stitch_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);

    for row in 0..2 {
        for col in 0..2 {
            storage
                .put_tile(base.clone(), row, col, tile((row * 2 + col + 1) as u8))
                .unwrap();
        }
    }
    storage.finished_writing().unwrap();

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    let stitched = loaded
        .get_display_image(0, base, 4, 4, 1, 0, 0, 4, 4)
        .unwrap();
    assert_eq!(stitched.width, 4);
    assert_eq!(stitched.height, 4);
    match stitched.pixels {
        PixelBuffer::Gray8(bytes) => {
            assert_eq!(bytes.len(), 16);
            assert_eq!(bytes[0], 1); // tile (0,0)
            assert_eq!(bytes[3], 2); // tile (0,1)
            assert_eq!(bytes[12], 3); // tile (1,0)
            assert_eq!(bytes[15], 4); // tile (1,1)
        }
        other => panic!("unexpected buffer: {other:?}"),
    }
}

#[test]
fn a_tile_never_written_leaves_background_fill_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);
    storage.put_tile(base.clone(), 0, 0, tile(9)).unwrap();
    storage.finished_writing().unwrap();

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    let stitched = loaded.get_display_image(0, base, 4, 4, 0, 0, 0, 8, 4).unwrap();
    match stitched.pixels {
        PixelBuffer::Gray8(bytes) => {
            assert_eq!(bytes[0], 9);
            assert_eq!(bytes[4], 0);
        }
        other => panic!("unexpected buffer: {other:?}"),
    }
}
