// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Synthetic vertices for states that are not commits yet.
//!
//! Two kinds exist per branch:
//! - staged changes, keyed `"{scope}/{ref}*"`, parented on the branch head;
//! - unresolved merges, keyed `"{scope}/{ref}<>{merging}"`, parented on the
//!   branch head and the head of the local branch being merged.
//!
//! Both kinds are evaluated independently on every cycle: synthesizing one
//! never skips retiring the other.
use std::collections::BTreeSet;

use tracing::debug;

use crate::branch::{Branch, BranchStatus};
use crate::graph::Graph;
use crate::ident::VertexKey;
use crate::vertex::Vertex;

/// Key of the staged-changes placeholder for `branch`.
pub fn staged_key(branch: &Branch) -> VertexKey {
    VertexKey::Staged {
        scope: branch.scope,
        name: branch.name.clone(),
    }
}

/// Key of the merge-conflict placeholder for `branch`, if it has a merge ref.
pub fn conflict_key(branch: &Branch) -> Option<VertexKey> {
    let merging = branch.merging.as_ref()?;
    Some(VertexKey::Conflict {
        scope: branch.scope,
        name: branch.name.clone(),
        merging: merging.clone(),
    })
}

/// Placeholder keys a branch record currently warrants.
fn wanted_keys(branch: &Branch, compare: Option<&Branch>) -> BTreeSet<VertexKey> {
    let mut keys = BTreeSet::new();
    if branch.status == BranchStatus::Uncommitted {
        keys.insert(staged_key(branch));
    }
    if branch.status == BranchStatus::Unmerged && compare.is_some() {
        keys.extend(conflict_key(branch));
    }
    keys
}

/// Every placeholder key a branch record could own.
fn owned_keys(branch: &Branch) -> BTreeSet<VertexKey> {
    let mut keys = BTreeSet::from([staged_key(branch)]);
    keys.extend(conflict_key(branch));
    keys
}

/// Counts of placeholder changes made in one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaceholderChanges {
    /// Placeholders created or replaced.
    pub synthesized: usize,
    /// Placeholders deleted.
    pub retired: usize,
}

impl Graph {
    /// Create, replace, or retire the placeholders of `current`.
    ///
    /// `previous` is the branch record from the prior snapshot, used to retire
    /// placeholders whose key no longer applies (status cleared, merge ref
    /// changed). `compare` is the local branch being merged, see
    /// [`compare_branch`](crate::branch::compare_branch). Must run after the
    /// real upserts of the cycle so that every parent exists.
    pub fn synthesize_placeholders(
        &mut self,
        previous: Option<&Branch>,
        current: &Branch,
        compare: Option<&Branch>,
        staged_message: &str,
    ) -> PlaceholderChanges {
        let mut changes = PlaceholderChanges::default();
        let wanted = wanted_keys(current, compare);

        let mut stale = owned_keys(current);
        if let Some(previous) = previous {
            stale.extend(owned_keys(previous));
        }
        for key in stale.difference(&wanted) {
            if self.delete_vertex(key).is_some() {
                debug!(placeholder = %key, "retired placeholder");
                changes.retired += 1;
            }
        }

        let head = VertexKey::Commit(current.head);
        if !self.contains(&head) {
            return changes;
        }
        // Restores the head color once a merge clears; a no-op otherwise.
        if let Some(vertex) = self.vertices.get_mut(&head) {
            vertex.apply_membership(current);
        }

        for key in wanted {
            let (parents, message) = match &key {
                VertexKey::Staged { .. } => (vec![head.clone()], staged_message.to_owned()),
                VertexKey::Conflict { merging, .. } => {
                    let mut parents = vec![head.clone()];
                    if let Some(compare) = compare {
                        let other = VertexKey::Commit(compare.head);
                        if self.contains(&other) && other != head {
                            parents.push(other);
                        }
                    }
                    let message = format!("unresolved merge of {merging} into {}", current.name);
                    (parents, message)
                }
                VertexKey::Commit(_) => continue,
            };
            let vertex = Vertex::placeholder(
                key,
                parents,
                current,
                self.repo().clone(),
                message,
            );
            self.replace_vertex(vertex);
            changes.synthesized += 1;
        }
        changes
    }

    /// Delete every placeholder a removed branch owned.
    pub fn retire_placeholders(&mut self, removed: &Branch) -> usize {
        owned_keys(removed)
            .iter()
            .filter(|key| self.delete_vertex(key).is_some())
            .count()
    }
}
