//! The TIFF-compatible container format: one physical file holding many
//! images, each described by a classic-TIFF IFD chained to the next.
//!
//! - [`header`] — the extended header every container file starts with.
//! - [`ifd`] — the fixed 13-tag IFD entry model.
//! - [`writer`] — sequential image writer with 4 GiB rollover.
//! - [`reader`] — positional image reader driven by index entries.

pub mod header;
pub mod ifd;
pub mod reader;
pub mod writer;

pub use header::{ByteOrder, ContainerHeader};
pub use reader::{ContainerReader, DecodedImage, PixelBuffer};
pub use writer::{ContainerWriter, ImageToWrite, CONTAINER_SIZE_LIMIT_BYTES};
