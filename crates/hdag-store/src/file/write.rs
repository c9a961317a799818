// SPDX-License-Identifier: Apache-2.0
//! Bundle file writer.
//!
//! [`encode_bundle`] produces the byte image; [`write_bundle_file`] lands
//! it on disk crash-safely: write to a `.new` sibling, flush it, rename
//! into place, then flush the directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use hdag_core::{Bundle, BundleError};

use crate::error::StoreError;

use super::types::{
    expected_len, FANOUT_BYTES, FORMAT_VERSION, HEADER_LEN, HEADER_MAGIC, TRAILER_MAGIC,
};

/// Encodes an organized bundle into its byte image.
///
/// # Errors
///
/// Returns [`StoreError::Bundle`] when the bundle is hashless or fails
/// its organized-invariant check.
pub fn encode_bundle(bundle: &Bundle) -> Result<Vec<u8>, StoreError> {
    if bundle.hash_len() == 0 {
        return Err(StoreError::Bundle(BundleError::Invalid {
            reason: "hashless bundles cannot be filed",
        }));
    }
    bundle.check_organized()?;

    let total = expected_len(
        bundle.hash_len(),
        bundle.len() as u32,
        bundle.extra_edges().len() as u32,
        bundle.unknown_hashes().len() as u32,
    ) as usize;
    let mut image = Vec::with_capacity(total);

    // Header.
    image.extend_from_slice(&HEADER_MAGIC);
    image.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    image.extend_from_slice(&bundle.hash_len().to_le_bytes());

    // Fanout.
    for entry in bundle.fanout() {
        image.extend_from_slice(&entry.to_le_bytes());
    }
    debug_assert_eq!(image.len(), HEADER_LEN + FANOUT_BYTES);

    // Node records: hash, target words, component, generation.
    for record in bundle.nodes() {
        image.extend_from_slice(&record.hash);
        image.extend_from_slice(&record.targets.first.to_word().to_le_bytes());
        image.extend_from_slice(&record.targets.last.to_word().to_le_bytes());
        image.extend_from_slice(&record.component.to_le_bytes());
        image.extend_from_slice(&record.generation.to_le_bytes());
    }

    // Extra edges.
    for edge in bundle.extra_edges() {
        image.extend_from_slice(&edge.to_le_bytes());
    }

    // Unknown hashes.
    for hash in bundle.unknown_hashes() {
        image.extend_from_slice(hash);
    }

    // Trailer.
    image.extend_from_slice(&TRAILER_MAGIC);
    image.extend_from_slice(&(bundle.len() as u32).to_le_bytes());
    image.extend_from_slice(&(bundle.extra_edges().len() as u32).to_le_bytes());
    image.extend_from_slice(&(bundle.unknown_hashes().len() as u32).to_le_bytes());

    assert_eq!(
        image.len(),
        total,
        "bundle image size disagrees with the layout arithmetic"
    );
    Ok(image)
}

/// Writes `bundle` to `path` atomically.
///
/// The image lands in a `.new` sibling first and is flushed before the
/// rename; the containing directory is flushed afterwards so the rename
/// itself survives a crash. Any failure before the rename removes the
/// sibling and leaves `path` untouched.
///
/// # Errors
///
/// Returns [`StoreError::Io`] on filesystem failure and propagates
/// encoding errors.
pub fn write_bundle_file(path: &Path, bundle: &Bundle) -> Result<(), StoreError> {
    let image = encode_bundle(bundle)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".new");
    let staging = Path::new(&staging);

    let written = (|| -> Result<(), StoreError> {
        let mut file = File::create(staging)?;
        file.write_all(&image)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(error) = written {
        let _ = fs::remove_file(staging);
        return Err(error);
    }

    if let Err(error) = fs::rename(staging, path) {
        let _ = fs::remove_file(staging);
        return Err(error.into());
    }
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}
