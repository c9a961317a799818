// SPDX-License-Identifier: Apache-2.0
//! Bundle image round-trips and corruption rejection.

#![allow(clippy::unwrap_used)]

use hdag_core::{Bundle, BundleError};
use hdag_store::file::{decode_bundle, encode_bundle, summarize};
use hdag_store::StoreError;
use hdag_text::TextSource;

fn organized(text: &str, hash_len: u16) -> Bundle {
    let mut source = TextSource::new(text.as_bytes(), hash_len);
    let mut bundle = Bundle::ingest(&mut source).unwrap();
    bundle.organize().unwrap();
    bundle
}

#[test]
fn image_round_trip_is_identity() {
    let bundle = organized("0f 03 07 0a\n07 03\n03\nfe 03 0f\n", 1);
    let image = encode_bundle(&bundle).unwrap();
    let decoded = decode_bundle(&image).unwrap();
    assert_eq!(decoded, bundle);
    // Re-encoding the decoded bundle reproduces the exact bytes.
    assert_eq!(encode_bundle(&decoded).unwrap(), image);
}

#[test]
fn wide_hash_round_trip() {
    let bundle = organized(
        "0102030405060708090a0b0c0d0e0f1011121314 ff\nff 00\n",
        20,
    );
    let image = encode_bundle(&bundle).unwrap();
    assert_eq!(decode_bundle(&image).unwrap(), bundle);
}

#[test]
fn summary_reports_the_counts() {
    let bundle = organized("0f 01 02 03\n", 1);
    let image = encode_bundle(&bundle).unwrap();
    let summary = summarize(&image).unwrap();
    assert_eq!(summary.hash_len, 1);
    assert_eq!(summary.node_count, 4);
    assert_eq!(summary.extra_edge_count, 3);
    assert_eq!(summary.unknown_count, 3);
    assert_eq!(summary.file_len, image.len() as u64);
}

#[test]
fn truncation_is_rejected() {
    let bundle = organized("01 02\n", 1);
    let image = encode_bundle(&bundle).unwrap();
    let truncated = &image[..image.len() - 1];
    assert!(matches!(
        decode_bundle(truncated).unwrap_err(),
        StoreError::SizeMismatch { .. }
    ));
}

#[test]
fn reordered_nodes_are_rejected() {
    let bundle = organized("01 02\n", 1);
    let mut image = encode_bundle(&bundle).unwrap();
    // Swap the two node records in place.
    let nodes_start = 8 + 1024;
    let record_len = 1 + 16;
    let (left, right) = image[nodes_start..nodes_start + 2 * record_len].split_at_mut(record_len);
    left.swap_with_slice(right);
    assert!(matches!(
        decode_bundle(&image).unwrap_err(),
        StoreError::OrderingViolation { .. }
    ));
}

#[test]
fn broken_fanout_is_rejected() {
    let bundle = organized("01 02\n", 1);
    let mut image = encode_bundle(&bundle).unwrap();
    // First fanout entry claims more nodes than the last.
    image[8..12].copy_from_slice(&100u32.to_le_bytes());
    assert!(matches!(
        decode_bundle(&image).unwrap_err(),
        StoreError::FanoutNotMonotonic { .. }
    ));
}

#[test]
fn unassigned_enumeration_fields_are_rejected() {
    let bundle = organized("01 02\n", 1);
    let mut image = encode_bundle(&bundle).unwrap();
    // Zero the generation of the first node record.
    let generation_at = 8 + 1024 + 1 + 12;
    image[generation_at..generation_at + 4].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(
        decode_bundle(&image).unwrap_err(),
        StoreError::Bundle(BundleError::InvalidFormat { .. })
    ));
}

#[test]
fn out_of_bounds_direct_target_is_rejected() {
    let bundle = organized("01 02\n", 1);
    let mut image = encode_bundle(&bundle).unwrap();
    // Node 01 sorts first with one direct target; point it past the node
    // array.
    let words_at = 8 + 1024 + 1;
    image[words_at..words_at + 4].copy_from_slice(&7u32.to_le_bytes());
    assert!(matches!(
        decode_bundle(&image).unwrap_err(),
        StoreError::Bundle(BundleError::InvalidFormat { .. })
    ));
}
