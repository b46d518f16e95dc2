// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Branch snapshot records supplied by the repository source.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ident::{BranchId, Oid, Scope};

/// Working-tree state of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    /// No pending changes.
    Clean,
    /// Staged or modified files not yet committed.
    Uncommitted,
    /// A merge is in progress with unresolved conflicts.
    Unmerged,
}

/// One branch as listed by the repository source.
///
/// `commits` lists every oid reachable from `head`, head first. The engine does
/// not own branches; it diffs successive snapshots of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Stable identity across snapshots.
    pub id: BranchId,
    /// Ref name (e.g. `main`, `origin/main`).
    pub name: String,
    /// Local branch or remote-tracking reference.
    pub scope: Scope,
    /// Working-tree root of the repository.
    pub root: PathBuf,
    /// Commit the branch currently points to.
    pub head: Oid,
    /// Working-tree status.
    pub status: BranchStatus,
    /// Oids reachable from `head`, head first.
    pub commits: Vec<Oid>,
    /// Ref being merged while `status` is [`BranchStatus::Unmerged`].
    #[serde(default)]
    pub merging: Option<String>,
    /// External consumers attached to this branch.
    #[serde(default)]
    pub linked: BTreeSet<String>,
}

impl Branch {
    /// `"{scope}/{ref}"`, the key used by [`BranchLookup`].
    pub fn scoped_name(&self) -> String {
        format!("{}/{}", self.scope, self.name)
    }

    /// Returns `true` for local branches.
    pub fn is_local(&self) -> bool {
        self.scope == Scope::Local
    }

    /// Returns `true` if `oid` is part of this branch's history.
    pub fn contains(&self, oid: &Oid) -> bool {
        self.commits.contains(oid)
    }
}

/// Maps `"{scope}/{ref}"` to the oid at that branch's head.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BranchLookup {
    heads: BTreeMap<String, Oid>,
}

impl BranchLookup {
    /// Build the lookup from a branch snapshot.
    pub fn from_branches<'a>(branches: impl IntoIterator<Item = &'a Branch>) -> Self {
        let heads = branches
            .into_iter()
            .map(|branch| (branch.scoped_name(), branch.head))
            .collect();
        Self { heads }
    }

    /// Head oid for a scoped name such as `local/main`.
    pub fn head(&self, scoped_name: &str) -> Option<Oid> {
        self.heads.get(scoped_name).copied()
    }

    /// Iterate over `(scoped name, head)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Oid)> {
        self.heads.iter().map(|(name, oid)| (name.as_str(), *oid))
    }

    /// Number of branches in the lookup.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// Returns `true` when no branches are known.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

/// Finds the local branch whose ref equals `branch.merging`.
pub fn compare_branch<'a>(branch: &Branch, branches: &'a [Branch]) -> Option<&'a Branch> {
    let merging = branch.merging.as_deref()?;
    branches
        .iter()
        .find(|candidate| candidate.is_local() && candidate.name == merging)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(name: &str, scope: Scope, head: u8) -> Branch {
        Branch {
            id: BranchId::new(format!("{scope}/{name}")),
            name: name.to_owned(),
            scope,
            root: PathBuf::from("/repo"),
            head: Oid([head; 20]),
            status: BranchStatus::Clean,
            commits: vec![Oid([head; 20])],
            merging: None,
            linked: BTreeSet::new(),
        }
    }

    #[test]
    fn lookup_keys_by_scoped_name() {
        let branches = [
            branch("main", Scope::Local, 1),
            branch("origin/main", Scope::Remote, 2),
        ];
        let lookup = BranchLookup::from_branches(&branches);
        assert_eq!(lookup.head("local/main"), Some(Oid([1; 20])));
        assert_eq!(lookup.head("remote/origin/main"), Some(Oid([2; 20])));
        assert_eq!(lookup.len(), 2);
        assert!(lookup.head("main").is_none());
    }

    #[test]
    fn compare_branch_only_matches_local_refs() {
        let mut merging = branch("main", Scope::Local, 1);
        merging.status = BranchStatus::Unmerged;
        merging.merging = Some("topic".into());
        let branches = vec![
            merging.clone(),
            branch("topic", Scope::Remote, 3),
            branch("topic", Scope::Local, 2),
        ];
        let found = compare_branch(&merging, &branches).map(|b| b.head);
        assert_eq!(found, Some(Oid([2; 20])));
        assert!(compare_branch(&branches[2], &branches).is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&BranchStatus::Uncommitted).ok();
        assert_eq!(json.as_deref(), Some("\"uncommitted\""));
    }
}
