//! Once a resolution level's active container file would cross the 4 GiB
//! limit, the next image lands in a second file instead
//! (`{prefix}_NDTiffStack_1.tif`), and both files are readable after the
//! dataset finishes.
//!
//! Writes several GiB of real pixel data to force an actual rollover, so
//! this is excluded from the default test run; `cargo test -- --ignored`
//! to run it.

use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

const TILE_SIDE: u32 = 4096; // 16 MiB per Gray8 image
const IMAGES_TO_CROSS_4_GIB: i32 = 300; // 300 * 16 MiB ~= 4.69 GiB

#[test]
#[ignore]
fn writing_past_4gib_rolls_over_to_a_second_container_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let pixels = vec![0u8; (TILE_SIDE * TILE_SIDE) as usize];

    for time in 0..IMAGES_TO_CROSS_4_GIB {
        let image = OwnedImage {
            width: TILE_SIDE,
            height: TILE_SIDE,
            pixel_type: PixelType::Gray8,
            pixels: pixels.clone(),
            metadata_json: b"{}".to_vec(),
            pixel_size_um: None,
        };
        storage
            .put_image(Coordinate::from_pairs([("time", time.into())]), image)
            .unwrap();
    }
    storage.finished_writing().unwrap();

    assert!(dir.path().join("Dataset_NDTiffStack.tif").is_file());
    assert!(dir.path().join("Dataset_NDTiffStack_1.tif").is_file());

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert_eq!(loaded.image_count(0).unwrap(), IMAGES_TO_CROSS_4_GIB as usize);
    let first = Coordinate::from_pairs([("time", 0.into())]);
    let last = Coordinate::from_pairs([("time", (IMAGES_TO_CROSS_4_GIB - 1).into())]);
    assert!(loaded.get_image(0, first).unwrap().is_some());
    assert!(loaded.get_image(0, last).unwrap().is_some());
}
