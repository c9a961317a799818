// SPDX-License-Identifier: Apache-2.0
//! Adjacency-list text format for hdag bundles.
//!
//! One logical record per line: whitespace-separated hex tokens, the
//! first naming the source node and the rest its targets. Every token
//! must decode to exactly the configured hash length; shorter tokens are
//! zero-extended on the left, longer tokens and odd digit counts are
//! errors. Blank lines are allowed and the final line needs no newline.
//!
//! [`TextSource`] tokenizes a byte stream into a
//! [`NodeSource`](hdag_core::NodeSource) for ingest; [`write_text`]
//! renders an organized bundle's known nodes back into the same format.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::manual_let_else,
    clippy::cognitive_complexity,
    clippy::option_if_let_else
)]

use std::io::BufRead;

use hdag_core::{Bundle, BundleError, NodeSource, SourceNode};

/// Node source tokenizing adjacency-list text from a buffered reader.
///
/// Single-shot: the underlying stream cannot be replayed, so
/// [`reset`](NodeSource::reset) reports `false`.
pub struct TextSource<R> {
    reader: R,
    hash_len: u16,
    line_number: u64,
    line: String,
}

impl<R: BufRead> TextSource<R> {
    /// Builds a tokenizer producing hashes of `hash_len` bytes.
    pub fn new(reader: R, hash_len: u16) -> Self {
        Self {
            reader,
            hash_len,
            line_number: 0,
            line: String::new(),
        }
    }
}

impl<R: BufRead> NodeSource for TextSource<R> {
    fn hash_len(&self) -> u16 {
        self.hash_len
    }

    fn next(&mut self) -> Result<Option<SourceNode>, BundleError> {
        loop {
            self.line.clear();
            let read = self.reader.read_line(&mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let mut tokens = self.line.split_whitespace();
            let Some(first) = tokens.next() else {
                continue;
            };
            let hash = decode_token(first, self.hash_len, self.line_number)?;
            let targets = tokens
                .map(|token| decode_token(token, self.hash_len, self.line_number))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Some(SourceNode { hash, targets }));
        }
    }
}

/// Decodes one hex token into a `hash_len`-byte hash, zero-extending
/// short tokens on the left.
fn decode_token(token: &str, hash_len: u16, line_number: u64) -> Result<Box<[u8]>, BundleError> {
    let hash_len = hash_len as usize;
    if token.len() % 2 != 0 {
        return Err(BundleError::invalid_format(format!(
            "line {line_number}: token \"{token}\" has an odd digit count"
        )));
    }
    if token.len() / 2 > hash_len {
        return Err(BundleError::invalid_format(format!(
            "line {line_number}: token \"{token}\" exceeds {hash_len} bytes"
        )));
    }
    let digits = hex::decode(token).map_err(|_| {
        BundleError::invalid_format(format!(
            "line {line_number}: token \"{token}\" is not hexadecimal"
        ))
    })?;
    let mut hash = vec![0u8; hash_len];
    hash[hash_len - digits.len()..].copy_from_slice(&digits);
    Ok(hash.into_boxed_slice())
}

/// Renders an organized bundle as adjacency-list text.
///
/// Known nodes only, one line per node in storage order: the node hash
/// followed by its target hashes, lowercase hex, space separated. An
/// empty bundle renders as the empty string.
///
/// # Errors
///
/// Returns [`BundleError::Invalid`] for a hashless bundle.
pub fn write_text(bundle: &Bundle) -> Result<String, BundleError> {
    if bundle.hash_len() == 0 {
        return Err(BundleError::Invalid {
            reason: "hashless bundles have no text form",
        });
    }
    let mut out = String::new();
    for index in 0..bundle.len() as u32 {
        let Some(record) = bundle.node(index) else {
            break;
        };
        if !record.is_known() {
            continue;
        }
        out.push_str(&hex::encode(&record.hash));
        for slot in 0..bundle.target_count(index) {
            out.push(' ');
            out.push_str(&hex::encode(bundle.target_node_hash(index, slot)));
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hdag_core::Targets;

    fn ingest(text: &str, hash_len: u16) -> Result<Bundle, BundleError> {
        let mut source = TextSource::new(text.as_bytes(), hash_len);
        let mut bundle = Bundle::ingest(&mut source)?;
        bundle.organize()?;
        Ok(bundle)
    }

    #[test]
    fn empty_input_round_trips_to_empty_text() {
        let bundle = ingest("", 4).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(write_text(&bundle).unwrap(), "");
    }

    #[test]
    fn single_record_parses() {
        let bundle = ingest("01020304 0a0b0c0d\n", 4).unwrap();
        let owner = bundle.find_node_idx(&[1, 2, 3, 4]).unwrap();
        assert_eq!(bundle.target_count(owner), 1);
        assert_eq!(bundle.target_node_hash(owner, 0), &[0x0a, 0x0b, 0x0c, 0x0d]);
    }

    #[test]
    fn short_tokens_zero_extend_on_the_left() {
        let bundle = ingest("ff 02\n", 4).unwrap();
        assert!(bundle.find_node_idx(&[0, 0, 0, 0xff]).is_some());
        assert!(bundle.find_node_idx(&[0, 0, 0, 0x02]).is_some());
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let bundle = ingest("AB CD\n", 1).unwrap();
        assert!(bundle.find_node_idx(&[0xab]).is_some());
        assert!(bundle.find_node_idx(&[0xcd]).is_some());
    }

    #[test]
    fn odd_digit_count_is_an_error() {
        let err = ingest("abc\n", 2).unwrap_err();
        assert!(matches!(err, BundleError::InvalidFormat { .. }));
        assert!(err.to_string().contains("odd digit count"));
    }

    #[test]
    fn over_long_token_is_an_error() {
        let err = ingest("0102030405\n", 4).unwrap_err();
        assert!(matches!(err, BundleError::InvalidFormat { .. }));
    }

    #[test]
    fn non_hex_token_is_an_error() {
        let err = ingest("zz\n", 1).unwrap_err();
        assert!(matches!(err, BundleError::InvalidFormat { .. }));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let bundle = ingest("\n01 02\n\n  \n03 02\n", 1).unwrap();
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn missing_trailing_newline_is_fine() {
        let bundle = ingest("01 02", 1).unwrap();
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn error_messages_carry_the_line_number() {
        let err = ingest("01 02\nxyz\n", 2).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn writer_skips_unknown_nodes_and_sorts_targets() {
        let bundle = ingest("09 04 02\n", 1).unwrap();
        // 02 and 04 are unknown and get no line of their own; 09's
        // targets come back in sorted order.
        assert_eq!(write_text(&bundle).unwrap(), "09 02 04\n");
    }

    #[test]
    fn text_round_trip_preserves_the_graph() {
        let original = ingest("0f 03 07\n07 03\n03\n", 1).unwrap();
        let rendered = write_text(&original).unwrap();
        let round_trip = ingest(&rendered, 1).unwrap();
        assert_eq!(original, round_trip);
    }

    #[test]
    fn two_line_cycle_is_reported() {
        let err = ingest("01 02 03\n03 02 01", 20).unwrap_err();
        assert!(matches!(err, BundleError::GraphCycle { .. }));
    }

    #[test]
    fn absent_target_node_renders_alone() {
        let bundle = ingest("05\n", 1).unwrap();
        let index = bundle.find_node_idx(&[5]).unwrap();
        assert_eq!(bundle.targets(index), Targets::ABSENT);
        assert_eq!(write_text(&bundle).unwrap(), "05\n");
    }
}
