// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Branch snapshot change detection.
//!
//! Branches are paired by [`BranchId`]. Paired branches are compared on a fixed
//! set of tracked fields; when `commits` differs the exact added and removed
//! oids are reported so unchanged ancestry is never re-walked.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;

use crate::branch::Branch;
use crate::ident::{BranchId, Oid};

/// Branch fields whose changes the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrackedField {
    /// Head oid moved.
    Head,
    /// Working-tree status changed.
    Status,
    /// Set of linked consumers changed.
    Linked,
    /// Reachable commit list changed.
    Commits,
    /// Merge ref changed.
    Merging,
}

/// One branch present in both snapshots with at least one tracked difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchChange<'a> {
    /// Record from the previous snapshot.
    pub previous: &'a Branch,
    /// Record from the current snapshot.
    pub current: &'a Branch,
    /// Tracked fields that differ.
    pub fields: BTreeSet<TrackedField>,
    /// Oids in `current.commits` but not in `previous.commits`, in list order.
    pub added_commits: Vec<Oid>,
    /// Oids in `previous.commits` but not in `current.commits`, in list order.
    pub removed_commits: Vec<Oid>,
}

impl BranchChange<'_> {
    /// Returns `true` if `field` differs between the snapshots.
    pub fn changed(&self, field: TrackedField) -> bool {
        self.fields.contains(&field)
    }

    /// Returns `true` when only coloring-relevant fields (head, status,
    /// merge ref) changed and the ancestry is untouched.
    pub fn is_status_only(&self) -> bool {
        !self.changed(TrackedField::Commits)
            && (self.changed(TrackedField::Head)
                || self.changed(TrackedField::Status)
                || self.changed(TrackedField::Merging))
    }
}

/// Delta between two branch snapshots. Every list is ordered by branch id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchDelta<'a> {
    /// Branches only in the current snapshot.
    pub added: Vec<&'a Branch>,
    /// Branches only in the previous snapshot.
    pub removed: Vec<&'a Branch>,
    /// Branches in both snapshots with tracked differences.
    pub modified: Vec<BranchChange<'a>>,
}

impl BranchDelta<'_> {
    /// Returns `true` when the snapshots are equivalent on tracked fields.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Partition `previous` and `current` into added / removed / modified.
///
/// Duplicate ids within one snapshot resolve to the first occurrence.
pub fn detect_changes<'a>(previous: &'a [Branch], current: &'a [Branch]) -> BranchDelta<'a> {
    let previous = index_by_id(previous);
    let current = index_by_id(current);
    let mut delta = BranchDelta::default();

    for (id, &branch) in &current {
        match previous.get(id) {
            None => delta.added.push(branch),
            Some(&before) => {
                if let Some(change) = compare(before, branch) {
                    delta.modified.push(change);
                }
            }
        }
    }
    delta.removed = previous
        .iter()
        .filter(|(id, _)| !current.contains_key(*id))
        .map(|(_, branch)| *branch)
        .collect();
    delta
}

fn index_by_id(branches: &[Branch]) -> BTreeMap<&BranchId, &Branch> {
    let mut index = BTreeMap::new();
    for branch in branches {
        index.entry(&branch.id).or_insert(branch);
    }
    index
}

fn compare<'a>(previous: &'a Branch, current: &'a Branch) -> Option<BranchChange<'a>> {
    let mut fields = BTreeSet::new();
    if previous.head != current.head {
        fields.insert(TrackedField::Head);
    }
    if previous.status != current.status {
        fields.insert(TrackedField::Status);
    }
    if previous.linked != current.linked {
        fields.insert(TrackedField::Linked);
    }
    if previous.commits != current.commits {
        fields.insert(TrackedField::Commits);
    }
    if previous.merging != current.merging {
        fields.insert(TrackedField::Merging);
    }
    if fields.is_empty() {
        return None;
    }
    let (added_commits, removed_commits) = if fields.contains(&TrackedField::Commits) {
        diff_commits(&previous.commits, &current.commits)
    } else {
        (Vec::new(), Vec::new())
    };
    Some(BranchChange {
        previous,
        current,
        fields,
        added_commits,
        removed_commits,
    })
}

/// Symmetric difference of two ordered commit lists as `(added, removed)`.
///
/// A pure reordering yields two empty lists.
pub fn diff_commits(previous: &[Oid], current: &[Oid]) -> (Vec<Oid>, Vec<Oid>) {
    let before: FxHashSet<&Oid> = previous.iter().collect();
    let after: FxHashSet<&Oid> = current.iter().collect();
    let added = current
        .iter()
        .filter(|oid| !before.contains(oid))
        .copied()
        .collect();
    let removed = previous
        .iter()
        .filter(|oid| !after.contains(oid))
        .copied()
        .collect();
    (added, removed)
}
