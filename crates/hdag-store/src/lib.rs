// SPDX-License-Identifier: Apache-2.0
//! hdag-store: bundle file layout and the directory database.
//!
//! The [`file`] module is the bit-exact on-disk contract for one bundle:
//! encode, decode, validate, summarize. [`Database`] manages a directory
//! of bundle files and drives the merge pipeline against it with a
//! writer-exclusive lock and crash-safe file replacement.
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

mod database;
mod error;
pub mod file;

/// Directory database and merge reporting.
pub use database::{Database, MergeReport};
/// Store-level errors.
pub use error::StoreError;
