//! An axis bound to one value kind (integer or string) rejects a later
//! write that disagrees, but the dataset stays otherwise healthy and the
//! accepted images still persist across a reopen.

use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType, StorageError};

fn tiny_image() -> OwnedImage {
    OwnedImage {
        width: 2,
        height: 2,
        pixel_type: PixelType::Gray8,
        pixels: vec![1, 2, 3, 4],
        metadata_json: b"{}".to_vec(),
        pixel_size_um: None,
    }
}

#[test]
fn string_after_int_is_rejected_and_prior_write_still_persists() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();

    let int_coord = Coordinate::from_pairs([("channel", 0.into())]);
    storage.put_image(int_coord.clone(), tiny_image()).unwrap();

    let string_coord = Coordinate::from_pairs([("channel", "GFP".into())]);
    let result = storage.put_image(string_coord, tiny_image());
    assert!(matches!(
        result,
        Err(StorageError::AxisTypeConflict { ref axis, .. }) if axis == "channel"
    ));

    storage.finished_writing().unwrap();

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert_eq!(loaded.image_count(0).unwrap(), 1);
    assert!(loaded.get_image(0, int_coord).unwrap().is_some());
}

#[test]
fn int_after_string_is_rejected_the_same_way() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();

    storage
        .put_image(Coordinate::from_pairs([("channel", "DAPI".into())]), tiny_image())
        .unwrap();

    let result = storage.put_image(Coordinate::from_pairs([("channel", 7.into())]), tiny_image());
    assert!(matches!(result, Err(StorageError::AxisTypeConflict { .. })));
    storage.finished_writing().unwrap();
}
