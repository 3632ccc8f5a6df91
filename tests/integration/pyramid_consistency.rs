//! A completed 2x2 quadrant of full-resolution tiles cascades to a single
//! coarser tile at the next level, whose pixels are the exact 2x2 box
//! average of the four inputs.

use ndtiff::container::PixelBuffer;
use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

fn solid_tile(fill: u8) -> OwnedImage {
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
fn coarser_level_tile_is_the_box_average_of_its_four_children() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);

    // Solid fills average cleanly: (10 + 20 + 30 + 40) / 4 quadrant-wise,
    // but since each tile is internally solid, every output pixel is just
    // that tile's own fill value.
    storage.put_tile(base.clone(), 0, 0, solid_tile(10)).unwrap();
    storage.put_tile(base.clone(), 0, 1, solid_tile(20)).unwrap();
    storage.put_tile(base.clone(), 1, 0, solid_tile(30)).unwrap();
    storage.put_tile(base.clone(), 1, 1, solid_tile(40)).unwrap();
    storage.finished_writing().unwrap();

    assert_eq!(storage.level_count().unwrap(), 2);

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    let parent_coord = base.with_axis("row", 0).with_axis("column", 0);
    let decoded = loaded.get_image(1, parent_coord).unwrap().unwrap();
    assert_eq!(decoded.width, 4);
    assert_eq!(decoded.height, 4);
    match decoded.pixels {
        PixelBuffer::Gray8(bytes) => {
            // quadrant layout: (0,0)=10 (0,1)=20 / (1,0)=30 (1,1)=40
            assert_eq!(bytes[0], 10); // top-left quadrant
            assert_eq!(bytes[3], 20); // top-right quadrant
            assert_eq!(bytes[12], 30); // bottom-left quadrant
            assert_eq!(bytes[15], 40); // bottom-right quadrant
        }
        other => panic!("unexpected buffer: {other:?}"),
    }
}

#[test]
fn non_uniform_tiles_average_per_pixel() {
    let dir = tempfile::tempdir().unwrap();
    let storage = NdTiffStorage::create(dir.path(), "Dataset", vec![], None).unwrap();
    let base = Coordinate::from_pairs([("time", 0.into())]);

    // A 2x2 top-left child block of [0, 10, 20, 30] averages to 15.
    let gradient = OwnedImage {
        width: 4,
        height: 4,
        pixel_type: PixelType::Gray8,
        pixels: vec![
            0, 10, 0, 0, //
            20, 30, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
        ],
        metadata_json: b"{}".to_vec(),
        pixel_size_um: None,
    };
    storage.put_tile(base.clone(), 0, 0, gradient).unwrap();
    storage.put_tile(base.clone(), 0, 1, solid_tile(0)).unwrap();
    storage.put_tile(base.clone(), 1, 0, solid_tile(0)).unwrap();
    storage.put_tile(base.clone(), 1, 1, solid_tile(0)).unwrap();
    storage.finished_writing().unwrap();

    let loaded = NdTiffStorage::load(dir.path()).unwrap();
    let parent_coord = base.with_axis("row", 0).with_axis("column", 0);
    let decoded = loaded.get_image(1, parent_coord).unwrap().unwrap();
    match decoded.pixels {
        PixelBuffer::Gray8(bytes) => assert_eq!(bytes[0], 15),
        other => panic!("unexpected buffer: {other:?}"),
    }
}
