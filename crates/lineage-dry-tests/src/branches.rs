// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builder for branch snapshot records.

use std::collections::BTreeSet;
use std::path::PathBuf;

use lineage_core::{Branch, BranchId, BranchStatus, Oid, Scope};

/// Builds [`Branch`] records with sensible defaults.
///
/// Defaults: local scope, root `/repo`, clean status, id `"{scope}/{name}"`.
/// `head` defaults to the first entry of `commits`.
///
/// # Example
///
/// ```
/// use lineage_dry_tests::{make_oid, BranchBuilder};
///
/// let main = BranchBuilder::local("main")
///     .commits([make_oid("C2"), make_oid("C1")])
///     .build();
/// assert_eq!(main.id.as_str(), "local/main");
/// assert_eq!(main.head, make_oid("C2"));
/// ```
#[derive(Debug, Clone)]
pub struct BranchBuilder {
    id: Option<String>,
    name: String,
    scope: Scope,
    root: PathBuf,
    head: Option<Oid>,
    status: BranchStatus,
    commits: Vec<Oid>,
    merging: Option<String>,
    linked: BTreeSet<String>,
}

impl BranchBuilder {
    /// A local branch named `name`.
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, Scope::Local)
    }

    /// A remote-tracking reference named `name` (e.g. `origin/main`).
    pub fn remote(name: impl Into<String>) -> Self {
        Self::new(name, Scope::Remote)
    }

    fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: None,
            name: name.into(),
            scope,
            root: PathBuf::from("/repo"),
            head: None,
            status: BranchStatus::Clean,
            commits: Vec::new(),
            merging: None,
            linked: BTreeSet::new(),
        }
    }

    /// Override the branch id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Working-tree root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Reachable commits, head first.
    pub fn commits(mut self, commits: impl IntoIterator<Item = Oid>) -> Self {
        self.commits = commits.into_iter().collect();
        self
    }

    /// Explicit head (otherwise the first commit).
    pub fn head(mut self, head: Oid) -> Self {
        self.head = Some(head);
        self
    }

    /// Working-tree status.
    pub fn status(mut self, status: BranchStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark the branch unmerged while merging `other`.
    pub fn merging(mut self, other: impl Into<String>) -> Self {
        self.status = BranchStatus::Unmerged;
        self.merging = Some(other.into());
        self
    }

    /// Attach a linked consumer.
    pub fn linked(mut self, consumer: impl Into<String>) -> Self {
        self.linked.insert(consumer.into());
        self
    }

    /// Produce the record. A branch without commits gets an all-zero head.
    pub fn build(self) -> Branch {
        let id = self
            .id
            .unwrap_or_else(|| format!("{}/{}", self.scope, self.name));
        let head = self
            .head
            .or_else(|| self.commits.first().copied())
            .unwrap_or(Oid([0; lineage_core::OID_LEN]));
        Branch {
            id: BranchId::new(id),
            name: self.name,
            scope: self.scope,
            root: self.root,
            head,
            status: self.status,
            commits: self.commits,
            merging: self.merging,
            linked: self.linked,
        }
    }
}
