//! A tiled, overlapped acquisition: reserved summary-metadata keys, the
//! `Full resolution/`/`Downsampled_x2/` directory layout, and the pyramid
//! and stitched reads both excluding the overlap margin correctly.

use ndtiff::container::{ContainerReader, PixelBuffer};
use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType, TileOverlap};

fn solid_tile(fill: u8) -> OwnedImage {
    OwnedImage {
        width: 10,
        height: 10,
        pixel_type: PixelType::Gray8,
        pixels: vec![fill; 100],
        metadata_json: b"{}".to_vec(),
        pixel_size_um: None,
    }
}

#[test]
fn tiled_dataset_gets_reserved_keys_and_full_resolution_layout() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(
        dir.path(),
        "Dataset",
        br#"{"UserNote":"acq-42"}"#.to_vec(),
        Some(TileOverlap { x: 2, y: 2 }),
    )
    .unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);

    storage.put_tile(base.clone(), 0, 0, solid_tile(10)).unwrap();
    storage.put_tile(base.clone(), 0, 1, solid_tile(20)).unwrap();
    storage.put_tile(base.clone(), 1, 0, solid_tile(30)).unwrap();
    storage.put_tile(base.clone(), 1, 1, solid_tile(40)).unwrap();
    storage.finished_writing().unwrap();

    // tileWidth=10, overlap=2 content is 8x8; four 4x4 downsampled
    // quadrants assemble into a single 8x8 level-1 tile.
    assert_eq!(storage.level_count().unwrap(), 2);

    let full_res = dir.path().join("Full resolution");
    let downsampled = dir.path().join("Downsampled_x2");
    assert!(full_res.join("NDTiff.index").is_file());
    assert!(downsampled.join("NDTiff.index").is_file());
    assert!(!dir.path().join("NDTiffStack.tif").is_file());

    let reader = ContainerReader::open(full_res.join("Dataset_NDTiffStack.tif")).unwrap();
    let summary: serde_json::Value = serde_json::from_slice(reader.summary_metadata()).unwrap();
    assert_eq!(summary["GridPixelOverlapX"], 2);
    assert_eq!(summary["GridPixelOverlapY"], 2);
    assert_eq!(summary["TiledImageStorage"], true);
    assert_eq!(summary["UserNote"], "acq-42");

    let reader_l1 = ContainerReader::open(downsampled.join("Dataset_NDTiffStack.tif")).unwrap();
    let summary_l1: serde_json::Value = serde_json::from_slice(reader_l1.summary_metadata()).unwrap();
    assert_eq!(summary_l1["GridPixelOverlapX"], 2);

    let parent_coord = base.with_axis("row", 0).with_axis("column", 0);
    let decoded = storage.get_image(1, parent_coord).unwrap().unwrap();
    assert_eq!(decoded.width, 8);
    assert_eq!(decoded.height, 8);
    match decoded.pixels {
        PixelBuffer::Gray8(bytes) => {
            assert_eq!(bytes[0], 10);
            assert_eq!(bytes[7], 20);
            assert_eq!(bytes[7 * 8], 30);
            assert_eq!(bytes[63], 40);
        }
        other => panic!("unexpected buffer: {other:?}"),
    }

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert_eq!(loaded.level_count().unwrap(), 2);
    let reloaded = loaded.get_image(1, base.with_axis("row", 0).with_axis("column", 0)).unwrap().unwrap();
    assert_eq!(reloaded.width, 8);
}

#[test]
fn stitched_read_at_level_zero_trims_half_overlap_at_every_tile_edge() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], Some(TileOverlap { x: 2, y: 2 })).unwrap();
    let base = Coordinate::new();

    let mut pixels = vec![0u8; 100];
    for row in 0..10u8 {
        for col in 0..10u8 {
            pixels[row as usize * 10 + col as usize] = row * 10 + col;
        }
    }
    let gridded = |fill_pixels: &[u8]| OwnedImage {
        width: 10,
        height: 10,
        pixel_type: PixelType::Gray8,
        pixels: fill_pixels.to_vec(),
        metadata_json: b"{}".to_vec(),
        pixel_size_um: None,
    };

    for row in 0..2i32 {
        for col in 0..2i32 {
            storage.put_tile(base.clone(), row, col, gridded(&pixels)).unwrap();
        }
    }
    storage.finished_writing().unwrap();

    // content_width = 10 - 2 = 8 per tile; a 2x2 grid of overlap-trimmed
    // tiles stitches to 16x16, not 12x12.
    let stitched = storage.get_display_image(0, base, 10, 10, 2, 0, 0, 16, 16).unwrap();
    match stitched.pixels {
        PixelBuffer::Gray8(bytes) => {
            assert_eq!(bytes.len(), 16 * 16);
            assert_eq!(bytes[0], 1 * 10 + 1);
        }
        other => panic!("unexpected buffer: {other:?}"),
    }
}
