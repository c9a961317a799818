// SPDX-License-Identifier: Apache-2.0
//! Layout constants and the light-weight file summary.

use hdag_core::FANOUT_LEN;

/// Magic bytes opening every bundle file.
pub const HEADER_MAGIC: [u8; 4] = *b"HDAG";

/// Magic bytes opening the trailer.
pub const TRAILER_MAGIC: [u8; 4] = *b"GADH";

/// The single supported format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size: magic, version, hash length.
pub(crate) const HEADER_LEN: usize = 8;

/// Fanout section size: 256 little-endian `u32` entries.
pub(crate) const FANOUT_BYTES: usize = FANOUT_LEN * 4;

/// Trailer size: magic plus three `u32` counts.
pub(crate) const TRAILER_LEN: usize = 16;

/// Fixed part of a node record: two target words, component, generation.
pub(crate) const NODE_FIXED_LEN: usize = 16;

/// Smallest well-formed file: header, fanout, trailer, nothing else.
pub(crate) const MIN_FILE_LEN: usize = HEADER_LEN + FANOUT_BYTES + TRAILER_LEN;

/// Counts and sizes of a bundle file, read without decoding the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
    /// Hash length in bytes.
    pub hash_len: u16,
    /// Number of node records.
    pub node_count: u32,
    /// Number of extra-edge entries.
    pub extra_edge_count: u32,
    /// Number of unknown hashes.
    pub unknown_count: u32,
    /// Total file size in bytes.
    pub file_len: u64,
}

/// Byte length of one node record.
pub(crate) fn node_record_len(hash_len: u16) -> usize {
    hash_len as usize + NODE_FIXED_LEN
}

/// Total file length implied by the header and trailer counts.
pub(crate) fn expected_len(hash_len: u16, nodes: u32, extra_edges: u32, unknown: u32) -> u64 {
    MIN_FILE_LEN as u64
        + u64::from(nodes) * node_record_len(hash_len) as u64
        + u64::from(extra_edges) * 4
        + u64::from(unknown) * u64::from(hash_len)
}
