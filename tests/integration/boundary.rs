//! Edge-case behaviors that don't fit neatly into one of the other
//! scenario files: write-pending visibility, negative tile addresses, and
//! an empty filename prefix.

use ndtiff::container::PixelBuffer;
use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

fn tile(fill: u8) -> OwnedImage {
    OwnedImage {
        width: 4,
        height: 4,
        pixel_type: PixelType::Gray8,
        pixels: vec![fill; 16],
        metadata_json: b"{}".to_vec(),
        pixel_size_um: None,
    }
}

#[test]
fn a_full_resolution_tile_is_visible_before_its_parent_quadrant_completes() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);

    storage.put_tile(base.clone(), 0, 0, tile(5)).unwrap();

    // Level 0 already has the tile; level 1 doesn't exist yet because only
    // one of the four quadrants has arrived.
    assert_eq!(storage.image_count(0).unwrap(), 1);
    assert_eq!(storage.level_count().unwrap(), 1);

    let coord = base.with_axis("row", 0).with_axis("column", 0);
    assert!(storage.get_image(0, coord).unwrap().is_some());
    storage.finished_writing().unwrap();
}

#[test]
fn negative_tile_addresses_persist_across_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);
    storage.put_tile(base.clone(), -3, -2, tile(7)).unwrap();
    storage.finished_writing().unwrap();

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    let coord = base.with_axis("row", -3).with_axis("column", -2);
    let decoded = loaded.get_image(0, coord).unwrap().unwrap();
    match decoded.pixels {
        PixelBuffer::Gray8(bytes) => assert!(bytes.iter().all(|&b| b == 7)),
        other => panic!("unexpected buffer: {other:?}"),
    }
}

#[test]
fn an_empty_prefix_still_produces_a_loadable_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "", vec![], None).unwrap();
    let coord = Coordinate::from_pairs([("time", 0.into())]);
    storage.put_image(coord.clone(), tile(3)).unwrap();
    storage.finished_writing().unwrap();

    assert!(dir.path().join("_NDTiffStack.tif").is_file());
    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert!(loaded.get_image(0, coord).unwrap().is_some());
}
