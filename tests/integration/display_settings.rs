//! The opaque `display_settings.txt` sidecar: never parsed by the engine,
//! just written verbatim on finish and handed back verbatim on load.

use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

fn gray_image(fill: u8) -> OwnedImage {
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
fn display_settings_set_before_finish_survives_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let settings = br#"{"channels":[{"color":"#00FF00","contrastMin":0,"contrastMax":255}]}"#.to_vec();

    {
        let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
        storage
            .put_image(Coordinate::from_pairs([("time", 0.into())]), gray_image(1))
            .unwrap();
        storage.set_display_settings(settings.clone()).unwrap();
        storage.finished_writing().unwrap();
    }

    assert!(dir.path().join("display_settings.txt").is_file());
    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert_eq!(loaded.display_settings().unwrap(), Some(settings));
}

#[test]
fn a_dataset_that_never_set_display_settings_reloads_with_none() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
        storage.finished_writing().unwrap();
    }

    assert!(!dir.path().join("display_settings.txt").exists());
    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    assert_eq!(loaded.display_settings().unwrap(), None);
}
