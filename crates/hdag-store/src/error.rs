// SPDX-License-Identifier: Apache-2.0
//! Store-level error type.

use std::io;
use std::path::PathBuf;

use hdag_core::BundleError;
use thiserror::Error;

/// Errors raised by the bundle file layer and the directory database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A pipeline failure bubbled up from the bundle engine.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// File is too small to contain a header and trailer.
    #[error("file too small: {size} bytes, minimum {minimum}")]
    FileTooSmall {
        /// Actual file size.
        size: usize,
        /// Minimum required size.
        minimum: usize,
    },

    /// Header or trailer magic bytes do not match.
    #[error("invalid {which} magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Which magic failed, `"header"` or `"trailer"`.
        which: &'static str,
        /// Expected magic bytes.
        expected: [u8; 4],
        /// Actual magic bytes found.
        actual: [u8; 4],
    },

    /// The format version is not supported.
    #[error("unsupported format version {version}")]
    UnsupportedVersion {
        /// Version found in the header.
        version: u16,
    },

    /// The file length disagrees with the counts it declares.
    #[error("file size mismatch: counts require {expected} bytes, file has {actual}")]
    SizeMismatch {
        /// Size implied by header and trailer counts.
        expected: u64,
        /// Actual file size.
        actual: u64,
    },

    /// Fanout and trailer disagree about the node count.
    #[error("count mismatch: fanout ends at {fanout}, trailer declares {trailer}")]
    CountMismatch {
        /// Final fanout entry.
        fanout: u32,
        /// Trailer node count.
        trailer: u32,
    },

    /// The fanout table is not monotonic.
    #[error("fanout table decreases at entry {entry}")]
    FanoutNotMonotonic {
        /// First decreasing entry.
        entry: usize,
    },

    /// Node hashes are not strictly ascending.
    #[error("node ordering violation at index {index}")]
    OrderingViolation {
        /// Index of the out-of-order node.
        index: u32,
    },

    /// The incoming hash length does not match the database.
    #[error("hash length mismatch: database uses {database}, incoming uses {incoming}")]
    HashLenMismatch {
        /// Hash length of the database bundles.
        database: u16,
        /// Hash length of the incoming data.
        incoming: u16,
    },

    /// Another writer holds the database lock.
    #[error("database is locked: {}", .path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },
}
