// SPDX-License-Identifier: Apache-2.0
//! Merging new knowledge into a database of organized bundles.
//!
//! A merge first organizes the incoming node sequence on its own, then
//! decides which existing bundles can no longer stand as written:
//!
//! - An incoming known node that an existing bundle also knows must agree
//!   with it; the incoming copy is then dropped as redundant.
//! - An incoming known node that an existing bundle lists as unknown
//!   supersedes that listing, so the bundle joins the rebuild set.
//! - The rebuild set closes transitively: a bundle whose known node is
//!   listed as unknown by the incoming bundle or by any rebuild-set
//!   member joins the set too.
//!
//! The incoming remainder and the rebuild set are then re-organized into
//! one merged bundle, with the untouched bundles standing by as read-only
//! conflict-check context. Persisting the result is the store layer's
//! job; this module only plans and builds.

use crate::bundle::Bundle;
use crate::error::BundleError;
use crate::source::{BundleSource, ConcatSource, NodeSource};
use crate::target::Targets;

/// Result of planning and building a merge.
#[derive(Debug)]
pub struct MergeOutcome {
    /// The replacement bundle. Empty when the incoming sequence added
    /// nothing the database did not already know.
    pub merged: Bundle,
    /// Indices of the database bundles the merged bundle replaces,
    /// ascending.
    pub rebuilt: Vec<usize>,
}

/// Organizes `source` against `database` and builds the merged bundle.
///
/// `database` bundles must be organized and share one hash length. On
/// success the caller replaces the bundles named by
/// [`MergeOutcome::rebuilt`] with [`MergeOutcome::merged`]; on error the
/// database is untouched.
///
/// # Errors
///
/// Returns [`BundleError::Invalid`] on hash-length disagreement,
/// [`BundleError::NodeConflict`] when incoming content contradicts the
/// database, and propagates ingest and organization failures.
pub fn merge_into(
    database: &[&Bundle],
    source: &mut dyn NodeSource,
) -> Result<MergeOutcome, BundleError> {
    if database
        .iter()
        .any(|bundle| bundle.hash_len() != source.hash_len())
    {
        return Err(BundleError::Invalid {
            reason: "incoming hash length differs from the database",
        });
    }

    let mut incoming = Bundle::ingest(source)?;
    incoming.organize()?;

    let rebuilt = plan_rebuild(database, &mut incoming)?;

    let mut parts: Vec<Box<dyn NodeSource + '_>> = Vec::with_capacity(rebuilt.len() + 1);
    parts.push(Box::new(BundleSource::new(&incoming)));
    for &index in &rebuilt {
        parts.push(Box::new(BundleSource::new(database[index])));
    }
    let mut concatenated = ConcatSource::new(parts)?;

    let context: Vec<&Bundle> = database
        .iter()
        .enumerate()
        .filter(|(index, _)| !rebuilt.contains(index))
        .map(|(_, bundle)| *bundle)
        .collect();

    let mut merged = Bundle::ingest(&mut concatenated)?;
    merged.organize_with_context(&context)?;

    Ok(MergeOutcome { merged, rebuilt })
}

/// Marks the database bundles superseded by `incoming` and drops the
/// incoming nodes the database already knows.
fn plan_rebuild(database: &[&Bundle], incoming: &mut Bundle) -> Result<Vec<usize>, BundleError> {
    let mut rebuild = vec![false; database.len()];

    for index in 0..incoming.len() as u32 {
        if !incoming.nodes()[index as usize].is_known() {
            continue;
        }
        let mut redundant = false;
        for (db_index, bundle) in database.iter().enumerate() {
            let hash = &incoming.nodes()[index as usize].hash;
            let Some(found) = bundle.find_node_idx(hash) else {
                continue;
            };
            if bundle.nodes()[found as usize].is_known() {
                if !incoming.targets_match(index, bundle, found) {
                    return Err(BundleError::NodeConflict { hash: hash.clone() });
                }
                redundant = true;
            } else {
                rebuild[db_index] = true;
            }
        }
        if redundant {
            incoming.nodes[index as usize].targets = Targets::UNKNOWN;
        }
    }

    // Close the set: a bundle is pulled in when one of its known nodes is
    // listed as unknown by the incoming bundle or by any member already
    // marked. Repeat until a full sweep changes nothing.
    loop {
        let mut changed = false;
        for db_index in 0..database.len() {
            if rebuild[db_index] {
                continue;
            }
            let listed_unknown = |hash: &[u8]| {
                incoming.unknown_contains(hash)
                    || database
                        .iter()
                        .zip(&rebuild)
                        .any(|(member, &marked)| marked && member.unknown_contains(hash))
            };
            let pulled = database[db_index]
                .nodes()
                .iter()
                .any(|node| node.is_known() && listed_unknown(&node.hash));
            if pulled {
                rebuild[db_index] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    Ok(rebuild
        .iter()
        .enumerate()
        .filter_map(|(index, &marked)| marked.then_some(index))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::{SourceNode, VecSource};

    fn node(hash: u8, targets: &[u8]) -> SourceNode {
        SourceNode {
            hash: Box::from([hash].as_slice()),
            targets: targets
                .iter()
                .map(|&byte| Box::from([byte].as_slice()))
                .collect(),
        }
    }

    fn organized(nodes: Vec<SourceNode>) -> Bundle {
        let mut source = VecSource::new(1, nodes);
        let mut bundle = Bundle::ingest(&mut source).unwrap();
        bundle.organize().unwrap();
        bundle
    }

    #[test]
    fn merge_into_empty_database() {
        let mut source = VecSource::new(1, vec![node(1, &[2])]);
        let outcome = merge_into(&[], &mut source).unwrap();
        assert!(outcome.rebuilt.is_empty());
        assert_eq!(outcome.merged.len(), 2);
        outcome.merged.check_organized().unwrap();
    }

    #[test]
    fn identical_content_merges_to_nothing() {
        let existing = organized(vec![node(1, &[2])]);
        let mut source = VecSource::new(1, vec![node(1, &[2])]);
        let outcome = merge_into(&[&existing], &mut source).unwrap();
        assert!(outcome.rebuilt.is_empty());
        assert!(outcome.merged.is_empty());
    }

    #[test]
    fn conflicting_content_fails() {
        let existing = organized(vec![node(1, &[2])]);
        let mut source = VecSource::new(1, vec![node(1, &[3])]);
        let err = merge_into(&[&existing], &mut source).unwrap_err();
        match err {
            BundleError::NodeConflict { hash } => assert_eq!(hash.as_ref(), &[1]),
            other => unreachable!("expected NodeConflict, got {other}"),
        }
    }

    #[test]
    fn defining_an_unknown_node_rebuilds_its_bundle() {
        // The existing bundle knows 01 and lists 02 as unknown; the
        // incoming sequence defines 02.
        let existing = organized(vec![node(1, &[2])]);
        let mut source = VecSource::new(1, vec![node(2, &[3])]);
        let outcome = merge_into(&[&existing], &mut source).unwrap();
        assert_eq!(outcome.rebuilt, vec![0]);
        // 01, 02, 03 all live in the merged bundle now.
        assert_eq!(outcome.merged.len(), 3);
        let two = outcome.merged.find_node_idx(&[2]).unwrap();
        assert!(outcome.merged.nodes()[two as usize].is_known());
        outcome.merged.check_organized().unwrap();
    }

    #[test]
    fn incoming_unknowns_pull_in_their_defining_bundle() {
        // The incoming sequence references 01 without defining it; the
        // bundle that knows 01 joins the rebuild so the merged bundle can
        // resolve the reference.
        let existing = organized(vec![node(1, &[])]);
        let mut source = VecSource::new(1, vec![node(5, &[1])]);
        let outcome = merge_into(&[&existing], &mut source).unwrap();
        assert_eq!(outcome.rebuilt, vec![0]);
        assert_eq!(outcome.merged.len(), 2);
        assert!(outcome.merged.unknown_hashes().is_empty());
    }

    #[test]
    fn rebuild_set_closes_transitively() {
        // Bundle a knows 01 and lists 02 unknown; bundle b knows 02.
        // Incoming re-defines 02, marking a; the closure then pulls b
        // because b's known node 02 sits in a's unknown set.
        let bundle_a = organized(vec![node(1, &[2])]);
        let bundle_b = organized(vec![node(2, &[])]);
        let mut source = VecSource::new(1, vec![node(2, &[])]);
        let outcome = merge_into(&[&bundle_a, &bundle_b], &mut source).unwrap();
        assert_eq!(outcome.rebuilt, vec![0, 1]);
        assert_eq!(outcome.merged.len(), 2);
        outcome.merged.check_organized().unwrap();
    }

    #[test]
    fn untouched_bundles_serve_as_context() {
        // Two database bundles disagree about node 07. The incoming
        // sequence never mentions 07, but it pulls the second bundle into
        // the rebuild set, and the re-organization then checks that
        // bundle's nodes against the stable remainder.
        let stable = organized(vec![node(7, &[2])]);
        let disagreeing = organized(vec![node(7, &[8])]);
        let mut source = VecSource::new(1, vec![node(8, &[])]);
        let err = merge_into(&[&stable, &disagreeing], &mut source).unwrap_err();
        match err {
            BundleError::NodeConflict { hash } => assert_eq!(hash.as_ref(), &[7]),
            other => unreachable!("expected NodeConflict, got {other}"),
        }
    }

    #[test]
    fn hash_length_disagreement_is_rejected() {
        let existing = organized(vec![node(1, &[])]);
        let mut source = VecSource::new(4, Vec::new());
        assert!(matches!(
            merge_into(&[&existing], &mut source),
            Err(BundleError::Invalid { .. })
        ));
    }
}
