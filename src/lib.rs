//! # NDTiff
//!
//! A disk-resident storage engine for N-dimensional image datasets produced
//! by high-speed scientific microscopy acquisitions.
//!
//! Images are addressed by an open, user-defined [`Coordinate`] (time,
//! channel, z-slice, stage position, ...) rather than by path or index.
//! Pixels and per-image metadata are appended to a TIFF-compatible
//! container file; a companion `NDTiff.index` side file makes coordinate
//! lookup O(1) without scanning the container. Tiled acquisitions get a
//! resolution pyramid for free: every 2x2 block of adjacent tiles is
//! downsampled and cascaded up to the next coarser level as it completes.
//!
//! ## Architecture
//!
//! - [`coord`] - the axis coordinate type and its canonical JSON codec
//! - [`pixel`] - pixel type codes and their byte-depth/TIFF metadata
//! - [`index`] - the `NDTiff.index` record schema, writer, and reader
//! - [`container`] - the TIFF-compatible container format, writer and reader
//! - [`level`] - one resolution level: container files + index + entry map
//! - [`storage`] - [`NdTiffStorage`], the pyramid orchestrator
//! - [`stitch`] - assembling an arbitrary pixel window out of overlapping tiles
//! - [`bufferpool`] - capped, size-keyed recycling of pixel buffers
//! - [`writer_thread`] - the single dedicated writer thread every dataset uses
//! - [`io`] - positional file access and endian helpers
//! - [`error`] - the layered `thiserror` error taxonomy
//! - [`config`] - CLI and configuration types for the `ndtiff` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};
//!
//! let storage = NdTiffStorage::create("/tmp/my-dataset", "Dataset", b"{}".to_vec(), None)
//!     .expect("create dataset");
//!
//! let coord = Coordinate::from_pairs([("time", 0.into())]);
//! storage
//!     .put_image(
//!         coord.clone(),
//!         OwnedImage {
//!             width: 512,
//!             height: 512,
//!             pixel_type: PixelType::Gray16,
//!             pixels: vec![0u8; 512 * 512 * 2],
//!             metadata_json: b"{}".to_vec(),
//!             pixel_size_um: Some(0.11),
//!         },
//!     )
//!     .expect("write image");
//!
//! storage.finished_writing().expect("finish dataset");
//! ```

pub mod bufferpool;
pub mod config;
pub mod container;
pub mod coord;
pub mod error;
pub mod index;
pub mod io;
pub mod level;
pub mod pixel;
pub mod stitch;
pub mod storage;
pub mod writer_thread;

// Re-export commonly used types
pub use bufferpool::BufferPool;
pub use config::{Cli, Command, CreateConfig, FinishConfig, InfoConfig, PutDemoImageConfig};
pub use container::{
    ByteOrder, ContainerHeader, ContainerReader, ContainerWriter, DecodedImage, ImageToWrite,
    PixelBuffer, CONTAINER_SIZE_LIMIT_BYTES,
};
pub use coord::{AxisValue, Coordinate};
pub use error::{CodecError, ContainerError, IoError, StorageError};
pub use index::{Compression, IndexEntry, IndexWriter};
pub use io::{FileRange, LocalFile};
pub use level::ResolutionLevel;
pub use pixel::PixelType;
pub use stitch::{read_stitched_region, StitchedImage};
pub use storage::{NdTiffStorage, OwnedImage, TileOverlap};
pub use writer_thread::WriteQueue;
