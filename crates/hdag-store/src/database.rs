// SPDX-License-Identifier: Apache-2.0
//! Directory database of bundle files.
//!
//! A database is a directory holding one `*.hdag` file per organized
//! bundle, each named by a random hex suffix. Merging writes the
//! replacement bundle under `*.hdag.new`, flushes and renames it into
//! place, flushes the directory, and only then unlinks the files it
//! replaces. A `.lock` file taken with create-new semantics keeps
//! writers exclusive across that window; readers opening the directory
//! between the rename and the unlinks may briefly see superseded
//! bundles alongside the replacement, never a torn state.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use hdag_core::{merge_into, Bundle, NodeSource};
use rand::RngCore;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::file::{decode_bundle, write_bundle_file};

/// File extension of a live bundle.
const BUNDLE_EXT: &str = "hdag";

/// Name of the writer-exclusion lock file.
const LOCK_NAME: &str = ".lock";

/// An open directory database with every bundle loaded.
#[derive(Debug)]
pub struct Database {
    dir: PathBuf,
    bundles: Vec<StoredBundle>,
}

/// One loaded bundle and the file backing it.
#[derive(Debug)]
struct StoredBundle {
    path: PathBuf,
    bundle: Bundle,
}

/// What a merge changed on disk.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Path of the newly written bundle, when one was written.
    pub written: Option<PathBuf>,
    /// Paths of the superseded bundle files that were removed.
    pub removed: Vec<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the database at `dir` and loads every
    /// bundle file in it.
    ///
    /// Files are loaded in name order so repeated opens see the same
    /// bundle order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on filesystem failure and propagates
    /// bundle file validation errors.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<_>>()?;
        paths.retain(|path| path.extension().is_some_and(|ext| ext == BUNDLE_EXT));
        paths.sort();

        let mut bundles = Vec::with_capacity(paths.len());
        for path in paths {
            let bundle = decode_bundle(&fs::read(&path)?)?;
            debug!(path = %path.display(), nodes = bundle.len(), "loaded bundle");
            bundles.push(StoredBundle { path, bundle });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            bundles,
        })
    }

    /// Number of bundles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Returns `true` if the database holds no bundles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// The loaded bundles, in file-name order.
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.iter().map(|stored| &stored.bundle)
    }

    /// Hash length of the stored bundles, `None` while empty.
    #[must_use]
    pub fn hash_len(&self) -> Option<u16> {
        self.bundles.first().map(|stored| stored.bundle.hash_len())
    }

    /// Merges `source` into the database.
    ///
    /// Plans the rebuild set, organizes the merged bundle, writes it
    /// atomically, and removes the superseded files, all under the
    /// writer lock. Any failure before the rename leaves the database
    /// unchanged on disk and in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HashLenMismatch`] when `source` disagrees
    /// with the stored bundles, [`StoreError::Locked`] when another
    /// writer holds the lock, and propagates planning, encoding, and
    /// filesystem errors.
    pub fn merge(&mut self, source: &mut dyn NodeSource) -> Result<MergeReport, StoreError> {
        if let Some(hash_len) = self.hash_len() {
            if hash_len != source.hash_len() {
                return Err(StoreError::HashLenMismatch {
                    database: hash_len,
                    incoming: source.hash_len(),
                });
            }
        }
        let _lock = DirLock::acquire(&self.dir)?;

        let database: Vec<&Bundle> = self.bundles.iter().map(|stored| &stored.bundle).collect();
        let outcome = merge_into(&database, source)?;
        debug!(
            merged_nodes = outcome.merged.len(),
            rebuilt = outcome.rebuilt.len(),
            "merge planned"
        );

        if outcome.merged.is_empty() {
            debug_assert!(outcome.rebuilt.is_empty());
            info!("merge added nothing new");
            return Ok(MergeReport::default());
        }

        let path = self.fresh_bundle_path();
        write_bundle_file(&path, &outcome.merged)?;
        info!(path = %path.display(), nodes = outcome.merged.len(), "wrote merged bundle");

        let mut report = MergeReport {
            written: Some(path.clone()),
            removed: Vec::new(),
        };
        for &index in outcome.rebuilt.iter().rev() {
            let stored = self.bundles.remove(index);
            fs::remove_file(&stored.path)?;
            debug!(path = %stored.path.display(), "removed superseded bundle");
            report.removed.push(stored.path);
        }
        self.bundles.push(StoredBundle {
            path,
            bundle: outcome.merged,
        });
        Ok(report)
    }

    /// Picks an unused `<random>.hdag` path in the database directory.
    fn fresh_bundle_path(&self) -> PathBuf {
        let mut rng = rand::thread_rng();
        loop {
            let mut suffix = [0u8; 8];
            rng.fill_bytes(&mut suffix);
            let path = self
                .dir
                .join(format!("{}.{BUNDLE_EXT}", hex::encode(suffix)));
            if !path.exists() {
                return path;
            }
        }
    }
}

/// Writer-exclusion lock over a database directory.
///
/// Acquired by creating the lock file with create-new semantics and
/// released by deleting it on drop. A stale lock left by a crashed
/// writer must be removed by hand; guessing at staleness here would let
/// two writers interleave the unlink-and-rename window.
struct DirLock {
    path: PathBuf,
}

impl DirLock {
    fn acquire(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(LOCK_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::Locked { path })
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
