// SPDX-License-Identifier: Apache-2.0
//! Pull-based node sequences feeding the ingest stage.
//!
//! A [`NodeSource`] produces source nodes one at a time, each carrying its
//! hash and the hashes of its targets. Sources over replayable backings
//! support [`reset`](NodeSource::reset); single-shot sources (a byte
//! stream, for example) report that they cannot.

use crate::bundle::Bundle;
use crate::error::BundleError;

/// One node as produced by a [`NodeSource`]: its hash and the hashes of
/// its targets, all `hash_len` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    /// Hash of the node itself.
    pub hash: Box<[u8]>,
    /// Hashes of the node's targets, possibly empty.
    pub targets: Vec<Box<[u8]>>,
}

/// A pull-based producer of source nodes with a fixed hash length.
pub trait NodeSource {
    /// Hash length of every hash this source produces, in bytes.
    fn hash_len(&self) -> u16;

    /// Produces the next node, or `None` at the end of the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Resource`] on I/O failure and
    /// [`BundleError::InvalidFormat`] on malformed backing data.
    fn next(&mut self) -> Result<Option<SourceNode>, BundleError>;

    /// Rewinds to the first node. Returns `false` if this source cannot
    /// be replayed; the position is then unchanged.
    fn reset(&mut self) -> bool {
        false
    }
}

/// In-memory source over a vector of nodes.
///
/// Replayable; mainly useful for tests and programmatic construction.
#[derive(Debug, Clone)]
pub struct VecSource {
    hash_len: u16,
    nodes: Vec<SourceNode>,
    position: usize,
}

impl VecSource {
    /// Builds a source over `nodes` with the given hash length.
    #[must_use]
    pub fn new(hash_len: u16, nodes: Vec<SourceNode>) -> Self {
        Self {
            hash_len,
            nodes,
            position: 0,
        }
    }
}

impl NodeSource for VecSource {
    fn hash_len(&self) -> u16 {
        self.hash_len
    }

    fn next(&mut self) -> Result<Option<SourceNode>, BundleError> {
        let node = self.nodes.get(self.position).cloned();
        if node.is_some() {
            self.position += 1;
        }
        Ok(node)
    }

    fn reset(&mut self) -> bool {
        self.position = 0;
        true
    }
}

/// Source over the known nodes of an existing bundle.
///
/// Unknown nodes are skipped; they reappear as synthetic placeholders
/// when the emitted nodes are re-ingested. Target hashes resolve through
/// the bundle's accessors, so the bundle may be in either its
/// pre-compaction or compacted form.
#[derive(Debug)]
pub struct BundleSource<'a> {
    bundle: &'a Bundle,
    position: u32,
}

impl<'a> BundleSource<'a> {
    /// Builds a source over `bundle`'s known nodes.
    #[must_use]
    pub fn new(bundle: &'a Bundle) -> Self {
        Self {
            bundle,
            position: 0,
        }
    }
}

impl NodeSource for BundleSource<'_> {
    fn hash_len(&self) -> u16 {
        self.bundle.hash_len()
    }

    fn next(&mut self) -> Result<Option<SourceNode>, BundleError> {
        while (self.position as usize) < self.bundle.len() {
            let index = self.position;
            self.position += 1;
            let Some(record) = self.bundle.node(index) else {
                break;
            };
            if !record.is_known() {
                continue;
            }
            let count = self.bundle.target_count(index);
            let targets = (0..count)
                .map(|slot| Box::from(self.bundle.target_node_hash(index, slot)))
                .collect();
            return Ok(Some(SourceNode {
                hash: record.hash.clone(),
                targets,
            }));
        }
        Ok(None)
    }

    fn reset(&mut self) -> bool {
        self.position = 0;
        true
    }
}

/// Concatenation of several sources, drained in order.
pub struct ConcatSource<'a> {
    hash_len: u16,
    sources: Vec<Box<dyn NodeSource + 'a>>,
    current: usize,
}

impl<'a> ConcatSource<'a> {
    /// Builds a concatenation over `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] if the sources disagree on hash
    /// length or if `sources` is empty.
    pub fn new(sources: Vec<Box<dyn NodeSource + 'a>>) -> Result<Self, BundleError> {
        let Some(first) = sources.first() else {
            return Err(BundleError::Invalid {
                reason: "concatenation of zero sources",
            });
        };
        let hash_len = first.hash_len();
        if sources.iter().any(|source| source.hash_len() != hash_len) {
            return Err(BundleError::Invalid {
                reason: "concatenated sources disagree on hash length",
            });
        }
        Ok(Self {
            hash_len,
            sources,
            current: 0,
        })
    }
}

impl NodeSource for ConcatSource<'_> {
    fn hash_len(&self) -> u16 {
        self.hash_len
    }

    fn next(&mut self) -> Result<Option<SourceNode>, BundleError> {
        while let Some(source) = self.sources.get_mut(self.current) {
            if let Some(node) = source.next()? {
                return Ok(Some(node));
            }
            self.current += 1;
        }
        Ok(None)
    }

    fn reset(&mut self) -> bool {
        if self.sources.iter_mut().any(|source| !source.reset()) {
            return false;
        }
        self.current = 0;
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn node(hash: u8, targets: &[u8]) -> SourceNode {
        SourceNode {
            hash: Box::from([hash].as_slice()),
            targets: targets
                .iter()
                .map(|&byte| Box::from([byte].as_slice()))
                .collect(),
        }
    }

    #[test]
    fn vec_source_drains_and_resets() {
        let mut source = VecSource::new(1, vec![node(1, &[2]), node(2, &[])]);
        assert_eq!(source.next().unwrap().unwrap().hash.as_ref(), &[1]);
        assert_eq!(source.next().unwrap().unwrap().hash.as_ref(), &[2]);
        assert!(source.next().unwrap().is_none());
        assert!(source.reset());
        assert_eq!(source.next().unwrap().unwrap().hash.as_ref(), &[1]);
    }

    #[test]
    fn concat_source_chains_in_order() {
        let first = VecSource::new(1, vec![node(1, &[])]);
        let second = VecSource::new(1, vec![node(2, &[])]);
        let mut concat = ConcatSource::new(vec![Box::new(first), Box::new(second)]).unwrap();
        assert_eq!(concat.next().unwrap().unwrap().hash.as_ref(), &[1]);
        assert_eq!(concat.next().unwrap().unwrap().hash.as_ref(), &[2]);
        assert!(concat.next().unwrap().is_none());
        assert!(concat.reset());
        assert_eq!(concat.next().unwrap().unwrap().hash.as_ref(), &[1]);
    }

    #[test]
    fn concat_source_rejects_mismatched_hash_lengths() {
        let first = VecSource::new(1, Vec::new());
        let second = VecSource::new(2, Vec::new());
        assert!(ConcatSource::new(vec![Box::new(first), Box::new(second)]).is_err());
    }
}
