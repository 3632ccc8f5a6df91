//! The `NDTiff.index` side file: an append-only log of fixed-schema
//! records that makes random access to a container's images O(1).
//!
//! - [`entry`] — the binary record schema and its codec.
//! - [`writer`] — append-only writer, preallocated and truncated on finish.
//! - [`reader`] — loads an index file fully into memory on open.

pub mod entry;
pub mod reader;
pub mod writer;

pub use entry::{Compression, IndexEntry};
pub use reader::{read_index_map, read_index_map_strict};
pub use writer::{IndexWriter, INDEX_PREALLOCATION_BYTES};
