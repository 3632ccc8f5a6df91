//! A single non-tiled image, written by one process and read back by
//! another, round-trips through the real on-disk format (container file +
//! `NDTiff.index`), not just through the writer's in-memory state.

use ndtiff::container::PixelBuffer;
use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

fn gray_image(width: u32, height: u32, fill: u8) -> OwnedImage {
    OwnedImage {
        width,
        height,
        pixel_type: PixelType::Gray8,
        pixels: vec![fill; (width * height) as usize],
        metadata_json: br#"{"Exposure-ms":10}"#.to_vec(),
        pixel_size_um: Some(0.22),
    }
}

#[test]
fn single_image_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let storage = NdTiffStorage::create(dir.path(), "Dataset", br#"{"Prefix":"Dataset"}"#.to_vec(), None).unwrap();
        let coord = Coordinate::from_pairs([("time", 3.into())]);
        storage.put_image(coord, gray_image(8, 6, 42)).unwrap();
        storage.finished_writing().unwrap();
    }

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert_eq!(loaded.level_count().unwrap(), 1);
    assert_eq!(loaded.image_count(0).unwrap(), 1);

    let coord = Coordinate::from_pairs([("time", 3.into())]);
    let decoded = loaded.get_image(0, coord).unwrap().unwrap();
    assert_eq!(decoded.width, 8);
    assert_eq!(decoded.height, 6);
    match decoded.pixels {
        PixelBuffer::Gray8(bytes) => assert!(bytes.iter().all(|&b| b == 42)),
        other => panic!("unexpected buffer: {other:?}"),
    }
    assert_eq!(decoded.metadata_json, br#"{"Exposure-ms":10}"#);
}

#[test]
fn missing_coordinate_reads_back_as_none_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
        storage
            .put_image(Coordinate::from_pairs([("time", 0.into())]), gray_image(4, 4, 1))
            .unwrap();
        storage.finished_writing().unwrap();
    }

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    let absent = Coordinate::from_pairs([("time", 99.into())]);
    assert!(loaded.get_image(0, absent).unwrap().is_none());
}

#[test]
fn loading_a_directory_with_no_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    // Never even created as a dataset: no NDTiff.index anywhere under it.
    assert!(NdTiffStorage::load(dir.path()).is_err());
}
