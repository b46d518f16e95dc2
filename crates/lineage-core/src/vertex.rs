// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph-local vertex records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::branch::{Branch, BranchStatus};
use crate::commit::{Commit, Signature};
use crate::ident::{BranchId, Oid, RepoId, VertexKey};

/// Presentation hint derived from a vertex's head and conflict membership.
///
/// Priority: `Conflict` > `Head` > `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VertexColor {
    /// Plain history.
    Default,
    /// At least one branch head points here.
    Head,
    /// At least one branch has an unresolved merge anchored here.
    Conflict,
}

impl VertexColor {
    /// Derive the color from head/conflict membership.
    pub fn derive(heads: &BTreeSet<BranchId>, conflicted: &BTreeSet<BranchId>) -> Self {
        if !conflicted.is_empty() {
            Self::Conflict
        } else if !heads.is_empty() {
            Self::Head
        } else {
            Self::Default
        }
    }
}

/// Mutable wrapper around a commit (or placeholder) inside one repository graph.
///
/// Invariants
/// - `children` is derived: it holds exactly the keys whose `parents` include
///   this key, once the linker has run for the current batch.
/// - `heads ⊆ branches` and `conflicted ⊆ branches`.
/// - `staged` is `true` only for placeholder vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    /// Oid or synthetic placeholder key.
    pub key: VertexKey,
    /// Commit message, or the synthetic message of a placeholder.
    pub message: String,
    /// Parent keys in recorded order.
    pub parents: Vec<VertexKey>,
    /// Author identity (empty for placeholders and minimal records).
    pub author: Signature,
    /// Committer identity, when known.
    pub committer: Option<Signature>,
    /// Owning repository.
    pub repo: RepoId,
    /// Branches whose history includes this vertex.
    pub branches: BTreeSet<BranchId>,
    /// Branches whose head points here.
    pub heads: BTreeSet<BranchId>,
    /// Branches with an unresolved merge anchored here.
    pub conflicted: BTreeSet<BranchId>,
    /// Keys of vertices listing this one as a parent.
    pub children: BTreeSet<VertexKey>,
    /// Presentation hint.
    pub color: VertexColor,
    /// `true` for staged-changes placeholders.
    pub staged: bool,
}

impl Vertex {
    /// Build a vertex for `commit` with no membership yet.
    pub fn from_commit(commit: &Commit, repo: RepoId) -> Self {
        Self {
            key: VertexKey::Commit(commit.oid),
            message: commit.message.clone(),
            parents: commit.parents.iter().copied().map(VertexKey::Commit).collect(),
            author: commit.author.clone(),
            committer: commit.committer.clone(),
            repo,
            branches: BTreeSet::new(),
            heads: BTreeSet::new(),
            conflicted: BTreeSet::new(),
            children: BTreeSet::new(),
            color: VertexColor::Default,
            staged: false,
        }
    }

    /// Build a synthetic vertex owned by exactly one branch.
    pub(crate) fn placeholder(
        key: VertexKey,
        parents: Vec<VertexKey>,
        branch: &Branch,
        repo: RepoId,
        message: String,
    ) -> Self {
        let staged = matches!(key, VertexKey::Staged { .. });
        let mut conflicted = BTreeSet::new();
        if matches!(key, VertexKey::Conflict { .. }) {
            conflicted.insert(branch.id.clone());
        }
        let color = VertexColor::derive(&BTreeSet::new(), &conflicted);
        Self {
            key,
            message,
            parents,
            author: Signature::default(),
            committer: None,
            repo,
            branches: BTreeSet::from([branch.id.clone()]),
            heads: BTreeSet::new(),
            conflicted,
            children: BTreeSet::new(),
            color,
            staged,
        }
    }

    /// Object id for real commits.
    pub fn oid(&self) -> Option<Oid> {
        self.key.oid()
    }

    /// Returns `true` for staged/conflict placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.key.is_placeholder()
    }

    /// Merge `branch` into the membership sets and recompute the color.
    ///
    /// Head and conflict membership are derived from the live branch record,
    /// so repeated calls with the same record are idempotent.
    pub(crate) fn apply_membership(&mut self, branch: &Branch) {
        self.branches.insert(branch.id.clone());
        let at_head = self.oid() == Some(branch.head);
        if at_head {
            self.heads.insert(branch.id.clone());
        } else {
            self.heads.remove(&branch.id);
        }
        if at_head && branch.status == BranchStatus::Unmerged {
            self.conflicted.insert(branch.id.clone());
        } else {
            self.conflicted.remove(&branch.id);
        }
        self.recolor();
    }

    /// Drop `branch_id` from every membership set.
    pub(crate) fn detach(&mut self, branch_id: &BranchId) {
        self.branches.remove(branch_id);
        self.heads.remove(branch_id);
        self.conflicted.remove(branch_id);
        self.recolor();
    }

    fn recolor(&mut self) {
        self.color = VertexColor::derive(&self.heads, &self.conflicted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::Scope;
    use std::path::PathBuf;

    fn branch(id: &str, head: Oid, status: BranchStatus) -> Branch {
        Branch {
            id: BranchId::new(id),
            name: id.to_owned(),
            scope: Scope::Local,
            root: PathBuf::from("/repo"),
            head,
            status,
            commits: vec![head],
            merging: None,
            linked: BTreeSet::new(),
        }
    }

    #[test]
    fn conflict_outranks_head() {
        let oid = Oid([7; 20]);
        let mut vertex = Vertex::from_commit(&Commit::minimal(oid), RepoId::new("r"));
        vertex.apply_membership(&branch("main", oid, BranchStatus::Clean));
        assert_eq!(vertex.color, VertexColor::Head);
        vertex.apply_membership(&branch("topic", oid, BranchStatus::Unmerged));
        assert_eq!(vertex.color, VertexColor::Conflict);
        vertex.detach(&BranchId::new("topic"));
        assert_eq!(vertex.color, VertexColor::Head);
    }

    #[test]
    fn moving_head_away_clears_membership() {
        let oid = Oid([7; 20]);
        let mut vertex = Vertex::from_commit(&Commit::minimal(oid), RepoId::new("r"));
        vertex.apply_membership(&branch("main", oid, BranchStatus::Unmerged));
        vertex.apply_membership(&branch("main", Oid([8; 20]), BranchStatus::Unmerged));
        assert!(vertex.heads.is_empty());
        assert!(vertex.conflicted.is_empty());
        assert_eq!(vertex.color, VertexColor::Default);
        assert!(vertex.branches.contains(&BranchId::new("main")));
    }
}
