// SPDX-License-Identifier: Apache-2.0
//! Bundle file reader and validator.
//!
//! Validation proceeds outside-in: header and trailer first, then the
//! size arithmetic, then the fanout, and only then the records. The
//! decoded bundle passes through the engine's organized-invariant check
//! before it is handed to the caller, so a file that decodes is a file
//! the pipeline could have produced.

use hdag_core::{Bundle, NodeRecord, Target, Targets, FANOUT_LEN};

use crate::error::StoreError;

use super::types::{
    expected_len, node_record_len, FileSummary, FANOUT_BYTES, FORMAT_VERSION, HEADER_LEN,
    HEADER_MAGIC, MIN_FILE_LEN, TRAILER_LEN, TRAILER_MAGIC,
};

/// Reads the header and trailer of a bundle image without decoding the
/// records, validating magic, version, and the size arithmetic.
///
/// # Errors
///
/// Returns the structural [`StoreError`] variant naming the first
/// inconsistency.
pub fn summarize(data: &[u8]) -> Result<FileSummary, StoreError> {
    if data.len() < MIN_FILE_LEN {
        return Err(StoreError::FileTooSmall {
            size: data.len(),
            minimum: MIN_FILE_LEN,
        });
    }

    let header_magic = [data[0], data[1], data[2], data[3]];
    if header_magic != HEADER_MAGIC {
        return Err(StoreError::InvalidMagic {
            which: "header",
            expected: HEADER_MAGIC,
            actual: header_magic,
        });
    }
    let version = read_u16(data, 4);
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion { version });
    }
    let hash_len = read_u16(data, 6);

    let trailer = data.len() - TRAILER_LEN;
    let trailer_magic = [
        data[trailer],
        data[trailer + 1],
        data[trailer + 2],
        data[trailer + 3],
    ];
    if trailer_magic != TRAILER_MAGIC {
        return Err(StoreError::InvalidMagic {
            which: "trailer",
            expected: TRAILER_MAGIC,
            actual: trailer_magic,
        });
    }
    let node_count = read_u32(data, trailer + 4);
    let extra_edge_count = read_u32(data, trailer + 8);
    let unknown_count = read_u32(data, trailer + 12);

    let expected = expected_len(hash_len, node_count, extra_edge_count, unknown_count);
    if expected != data.len() as u64 {
        return Err(StoreError::SizeMismatch {
            expected,
            actual: data.len() as u64,
        });
    }

    Ok(FileSummary {
        hash_len,
        node_count,
        extra_edge_count,
        unknown_count,
        file_len: data.len() as u64,
    })
}

/// Decodes a bundle image into an organized [`Bundle`].
///
/// # Errors
///
/// Returns a structural [`StoreError`] variant for layout problems and
/// [`StoreError::Bundle`] when the decoded content violates an organized
/// bundle invariant.
pub fn decode_bundle(data: &[u8]) -> Result<Bundle, StoreError> {
    let summary = summarize(data)?;
    let hash_len = summary.hash_len;

    // Fanout: monotonic, ending at the node count.
    let mut fanout = [0u32; FANOUT_LEN];
    for (entry, slot) in fanout.iter_mut().enumerate() {
        *slot = read_u32(data, HEADER_LEN + entry * 4);
    }
    if let Some(entry) = (1..FANOUT_LEN).find(|&entry| fanout[entry - 1] > fanout[entry]) {
        return Err(StoreError::FanoutNotMonotonic { entry });
    }
    if fanout[FANOUT_LEN - 1] != summary.node_count {
        return Err(StoreError::CountMismatch {
            fanout: fanout[FANOUT_LEN - 1],
            trailer: summary.node_count,
        });
    }

    // Node records, checking hash order as they stream past.
    let record_len = node_record_len(hash_len);
    let mut offset = HEADER_LEN + FANOUT_BYTES;
    let mut nodes: Vec<NodeRecord> = Vec::with_capacity(summary.node_count as usize);
    for index in 0..summary.node_count {
        let hash: Box<[u8]> = Box::from(&data[offset..offset + hash_len as usize]);
        if let Some(previous) = nodes.last() {
            if previous.hash >= hash {
                return Err(StoreError::OrderingViolation { index });
            }
        }
        let words = offset + hash_len as usize;
        let targets = Targets {
            first: Target::from_word(read_u32(data, words)),
            last: Target::from_word(read_u32(data, words + 4)),
        };
        let mut record = NodeRecord::new(hash, targets);
        record.component = read_u32(data, words + 8);
        record.generation = read_u32(data, words + 12);
        nodes.push(record);
        offset += record_len;
    }

    // Extra edges.
    let mut extra_edges = Vec::with_capacity(summary.extra_edge_count as usize);
    for _ in 0..summary.extra_edge_count {
        extra_edges.push(read_u32(data, offset));
        offset += 4;
    }

    // Unknown hashes.
    let mut unknown_hashes: Vec<Box<[u8]>> = Vec::with_capacity(summary.unknown_count as usize);
    for _ in 0..summary.unknown_count {
        unknown_hashes.push(Box::from(&data[offset..offset + hash_len as usize]));
        offset += hash_len as usize;
    }
    debug_assert_eq!(offset, data.len() - TRAILER_LEN);

    Ok(Bundle::from_parts(
        hash_len,
        nodes,
        fanout,
        extra_edges,
        unknown_hashes,
    )?)
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
