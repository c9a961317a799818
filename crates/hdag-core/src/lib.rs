// SPDX-License-Identifier: Apache-2.0
//! hdag-core: bundle engine for hash-addressed directed acyclic graphs.
//!
//! A *bundle* is a self-contained in-memory hash DAG: nodes identified by
//! fixed-length opaque hashes, each carrying a possibly-unknown set of
//! target hashes as outgoing edges. The engine ingests adjacency input
//! from a [`NodeSource`], then *organizes* the bundle in place: sort,
//! dedup, fanout fill, compaction, and the generation/component
//! enumeration. Organized bundles can be merged into a database of
//! existing bundles while preserving acyclicity and content consistency;
//! persistence lives in the companion store crate.
//!
//! Every transformation is synchronous, single-threaded CPU and memory
//! work over exclusively owned arrays. Independent bundles may be worked
//! on from independent threads.
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

mod bundle;
mod compact;
mod enumerate;
mod error;
mod ingest;
mod invert;
mod merge;
mod node;
mod organize;
mod source;
mod target;

/// The owning aggregate for one hash DAG and its fanout table size.
pub use bundle::{Bundle, FANOUT_LEN};
/// Pipeline and merge error kinds.
pub use error::BundleError;
/// Merge planning over in-memory bundles.
pub use merge::{merge_into, MergeOutcome};
/// Node records.
pub use node::NodeRecord;
/// Pull-based node sequences and the provided implementations.
pub use source::{BundleSource, ConcatSource, NodeSource, SourceNode, VecSource};
/// Target references and their packed 32-bit encoding.
pub use target::{Target, Targets, ABSENT_WORD, INDEX_LIMIT, UNKNOWN_WORD};
