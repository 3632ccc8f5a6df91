//! Reading an `NDTiff.index` file back into an in-memory map.
//!
//! On open, a resolution level loads the *entire* index into memory — this
//! is what makes random access O(1) at the cost of O(file size) at startup,
//! a deliberate tradeoff for datasets whose index is tiny relative to pixel
//! data.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CodecError, IoError};
use crate::index::entry::IndexEntry;

/// Stream every record out of an `NDTiff.index` file into a map keyed by
/// axes-key. Truncated trailing bytes (as left by a crashed writer that
/// never reached `finished_writing`) are tolerated: decoding simply stops
/// at the first record that doesn't fully fit.
pub fn read_index_map(path: impl AsRef<Path>) -> Result<HashMap<String, IndexEntry>, IoError> {
    let path_ref = path.as_ref();
    let bytes = std::fs::read(path_ref).map_err(|e| IoError::Filesystem {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut map = HashMap::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        match IndexEntry::decode(&bytes[offset..]) {
            Ok((entry, consumed)) if consumed > 0 => {
                offset += consumed;
                map.insert(entry.axes_key.clone(), entry);
            }
            _ => break,
        }
    }
    Ok(map)
}

/// As [`read_index_map`], but fails instead of silently stopping on the
/// first malformed record — used when loading a dataset is expected to be
/// well-formed and a caller wants to detect corruption rather than losing
/// the tail of the index.
pub fn read_index_map_strict(
    path: impl AsRef<Path>,
) -> Result<HashMap<String, IndexEntry>, CodecError> {
    let path_ref = path.as_ref();
    let bytes = std::fs::read(path_ref)
        .map_err(|e| CodecError::MalformedIndexEntry(e.to_string()))?;

    let mut map = HashMap::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let (entry, consumed) = IndexEntry::decode(&bytes[offset..])?;
        offset += consumed;
        map.insert(entry.axes_key.clone(), entry);
    }
    Ok(map)
}
