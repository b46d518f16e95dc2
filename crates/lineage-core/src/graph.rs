// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Commit graph store: an arena of vertices keyed by [`VertexKey`].
//!
//! Parent and child relations are stored as key lists/sets, never as direct
//! references. `parents` is authoritative (it comes from the commit object);
//! `children` is derived and re-established by [`Graph::link`] after each batch
//! of upserts and removals.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::branch::Branch;
use crate::commit::Commit;
use crate::ident::{BranchId, Oid, RepoId, VertexKey};
use crate::store::CommitStore;
use crate::vertex::Vertex;

/// 32-byte BLAKE3 digest of a graph's canonical encoding.
pub type Hash32 = [u8; 32];

/// Errors raised by graph integrity checks.
///
/// `InconsistentGraph` signals a programming defect, not a recoverable input
/// problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A structural invariant does not hold.
    #[error("[INCONSISTENT_GRAPH] {key}: {detail}")]
    InconsistentGraph {
        /// Vertex at which the violation was observed.
        key: VertexKey,
        /// Human-readable description of the violation.
        detail: String,
    },
    /// Canonical encoding failed while computing the digest.
    #[error("graph encoding failed: {0}")]
    Encode(String),
}

/// Authoritative vertex mapping for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    repo: RepoId,
    pub(crate) vertices: BTreeMap<VertexKey, Vertex>,
}

impl Graph {
    /// Creates an empty graph for `repo`.
    pub fn new(repo: RepoId) -> Self {
        Self {
            repo,
            vertices: BTreeMap::new(),
        }
    }

    /// Owning repository.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Number of vertices, placeholders included.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` when the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns a vertex when it exists.
    pub fn get(&self, key: &VertexKey) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    /// Shorthand for looking up a real commit vertex.
    pub fn commit(&self, oid: &Oid) -> Option<&Vertex> {
        self.vertices.get(&VertexKey::Commit(*oid))
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &VertexKey) -> bool {
        self.vertices.contains_key(key)
    }

    /// Iterate over all vertices in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&VertexKey, &Vertex)> {
        self.vertices.iter()
    }

    /// Iterate over all keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &VertexKey> {
        self.vertices.keys()
    }

    /// Add `branch` to the history rooted at `oid`, creating missing vertices.
    ///
    /// Present vertices only have their membership merged and stop the walk;
    /// absent ones are created from the commit store and their parents are
    /// queued. Commits missing from the store (unresolvable objects) become
    /// terminal vertices. Returns the number of vertices created.
    pub fn upsert_vertex(&mut self, oid: Oid, branch: &Branch, store: &CommitStore) -> usize {
        let mut created = 0;
        let mut visited = BTreeSet::new();
        let mut work = vec![oid];
        while let Some(oid) = work.pop() {
            if !visited.insert(oid) {
                continue;
            }
            let key = VertexKey::Commit(oid);
            if let Some(vertex) = self.vertices.get_mut(&key) {
                vertex.apply_membership(branch);
                continue;
            }
            let commit = store.get(&oid).unwrap_or_else(|| {
                debug!(oid = %oid.short(), "commit not in store; creating terminal vertex");
                Arc::new(Commit::minimal(oid))
            });
            let mut vertex = Vertex::from_commit(&commit, self.repo.clone());
            vertex.apply_membership(branch);
            work.extend(commit.parents.iter().rev().copied());
            self.vertices.insert(key, vertex);
            created += 1;
        }
        created
    }

    /// Detach `branch_id` from the vertex at `oid`, deleting it when no branch
    /// references it any longer.
    ///
    /// `survivor` is the branch's current record when the branch still exists.
    /// After a deletion each former parent that is still in the survivor's
    /// history is re-upserted so its head/conflict color follows the branch.
    /// A deleted branch (`survivor == None`) is never re-attached. Returns the
    /// number of vertices deleted (0 or 1).
    pub fn remove_vertex(
        &mut self,
        oid: &Oid,
        branch_id: &BranchId,
        survivor: Option<&Branch>,
        store: &CommitStore,
    ) -> usize {
        let key = VertexKey::Commit(*oid);
        let Some(vertex) = self.vertices.get_mut(&key) else {
            return 0;
        };
        vertex.detach(branch_id);
        if !vertex.branches.is_empty() {
            return 0;
        }
        let Some(removed) = self.delete_vertex(&key) else {
            return 0;
        };
        if let Some(branch) = survivor {
            for parent in removed.parents.iter().filter_map(VertexKey::oid) {
                if branch.contains(&parent) && self.contains(&VertexKey::Commit(parent)) {
                    self.upsert_vertex(parent, branch, store);
                }
            }
        }
        1
    }

    /// Detach `branch_id` from real vertices it still claims outside its
    /// commit list, deleting those left without a branch.
    ///
    /// Terminal vertices for unresolvable parents carry the membership of the
    /// branch that walked into them without being listed in its commits. For a
    /// surviving branch, direct parents of its listed commits keep the
    /// membership. Returns the number of vertices deleted.
    pub fn detach_stray(
        &mut self,
        branch_id: &BranchId,
        survivor: Option<&Branch>,
        store: &CommitStore,
    ) -> usize {
        let mut kept: BTreeSet<Oid> = BTreeSet::new();
        if let Some(branch) = survivor {
            for oid in &branch.commits {
                kept.insert(*oid);
                if let Some(vertex) = self.commit(oid) {
                    kept.extend(vertex.parents.iter().filter_map(VertexKey::oid));
                }
            }
        }
        let stray: Vec<Oid> = self
            .vertices
            .values()
            .filter(|vertex| vertex.branches.contains(branch_id))
            .filter_map(Vertex::oid)
            .filter(|oid| !kept.contains(oid))
            .collect();
        stray
            .iter()
            .map(|oid| self.remove_vertex(oid, branch_id, survivor, store))
            .sum()
    }

    /// Rebuild the terminal vertex at `oid` once its commit is in the store.
    ///
    /// Membership is kept; commit fields and parents come from the store, and
    /// the recovered parents are walked for every member branch found in
    /// `branches`. Returns the number of vertices created.
    pub fn resolve_terminal(&mut self, oid: Oid, branches: &[Branch], store: &CommitStore) -> usize {
        let key = VertexKey::Commit(oid);
        let (Some(existing), Some(commit)) = (self.vertices.get(&key), store.get(&oid)) else {
            return 0;
        };
        let mut vertex = Vertex::from_commit(&commit, self.repo.clone());
        vertex.branches = existing.branches.clone();
        vertex.heads = existing.heads.clone();
        vertex.conflicted = existing.conflicted.clone();
        vertex.color = existing.color;
        let members: Vec<&Branch> = branches
            .iter()
            .filter(|branch| vertex.branches.contains(&branch.id))
            .collect();
        debug!(oid = %oid.short(), parents = commit.parents.len(), "terminal vertex resolved");
        self.replace_vertex(vertex);
        let mut created = 0;
        for branch in members {
            for parent in &commit.parents {
                created += self.upsert_vertex(*parent, branch, store);
            }
        }
        created
    }

    /// Remove a vertex and drop its key from each parent's `children`.
    pub(crate) fn delete_vertex(&mut self, key: &VertexKey) -> Option<Vertex> {
        let removed = self.vertices.remove(key)?;
        for parent in &removed.parents {
            if let Some(parent) = self.vertices.get_mut(parent) {
                parent.children.remove(key);
            }
        }
        Some(removed)
    }

    /// Insert or replace a vertex, keeping any children already linked to it.
    pub(crate) fn replace_vertex(&mut self, mut vertex: Vertex) {
        if let Some(previous) = self.vertices.remove(&vertex.key) {
            for parent in &previous.parents {
                if !vertex.parents.contains(parent) {
                    if let Some(parent) = self.vertices.get_mut(parent) {
                        parent.children.remove(&previous.key);
                    }
                }
            }
            vertex.children = previous.children;
        }
        self.vertices.insert(vertex.key.clone(), vertex);
    }

    /// Establish child back-references from every vertex's parents.
    ///
    /// Idempotent; run once after a batch. Returns the number of links added.
    pub fn link(&mut self) -> usize {
        let edges: Vec<(VertexKey, VertexKey)> = self
            .vertices
            .iter()
            .flat_map(|(key, vertex)| {
                vertex
                    .parents
                    .iter()
                    .map(move |parent| (parent.clone(), key.clone()))
            })
            .collect();
        let mut added = 0;
        for (parent, child) in edges {
            if let Some(parent) = self.vertices.get_mut(&parent) {
                if parent.children.insert(child) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Verify the structural invariants of the graph.
    ///
    /// Checks that parents exist, that `children` is exactly the inverse of
    /// `parents`, that every vertex is referenced by at least one branch
    /// (placeholders by exactly one) and only by branches in `live`, that
    /// head/conflict sets are subsets of `branches`, and that no real commit
    /// lists a placeholder as parent.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentGraph`] for the first violation found.
    pub fn check_consistency(&self, live: &[Branch]) -> Result<(), GraphError> {
        let fail = |key: &VertexKey, detail: String| GraphError::InconsistentGraph {
            key: key.clone(),
            detail,
        };
        let live: BTreeSet<&BranchId> = live.iter().map(|branch| &branch.id).collect();
        for (key, vertex) in &self.vertices {
            if &vertex.key != key {
                return Err(fail(key, format!("stored under mismatched key {}", vertex.key)));
            }
            if vertex.branches.is_empty() {
                return Err(fail(key, "no branch references this vertex".into()));
            }
            if let Some(dead) = vertex.branches.iter().find(|id| !live.contains(id)) {
                return Err(fail(key, format!("referenced by unknown branch {dead}")));
            }
            if vertex.is_placeholder() && vertex.branches.len() != 1 {
                return Err(fail(key, "placeholder must belong to exactly one branch".into()));
            }
            if !vertex.heads.is_subset(&vertex.branches)
                || !vertex.conflicted.is_subset(&vertex.branches)
            {
                return Err(fail(key, "head/conflict membership outside branches".into()));
            }
            for parent in &vertex.parents {
                let Some(parent_vertex) = self.vertices.get(parent) else {
                    return Err(fail(key, format!("missing parent {parent}")));
                };
                if !vertex.is_placeholder() && parent.is_placeholder() {
                    return Err(fail(key, format!("placeholder {parent} used as parent")));
                }
                if !parent_vertex.children.contains(key) {
                    return Err(fail(parent, format!("child {key} not linked")));
                }
            }
            for child in &vertex.children {
                let linked = self
                    .vertices
                    .get(child)
                    .is_some_and(|child| child.parents.contains(key));
                if !linked {
                    return Err(fail(key, format!("dangling child {child}")));
                }
            }
        }
        Ok(())
    }

    /// BLAKE3 digest of the canonical CBOR encoding (vertices in key order).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Encode`] if CBOR serialization fails.
    pub fn digest(&self) -> Result<Hash32, GraphError> {
        #[derive(Serialize)]
        struct Canonical<'a> {
            repo: &'a RepoId,
            vertices: Vec<&'a Vertex>,
        }
        let canonical = Canonical {
            repo: &self.repo,
            vertices: self.vertices.values().collect(),
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&canonical, &mut bytes)
            .map_err(|err| GraphError::Encode(err.to_string()))?;
        Ok(blake3::hash(&bytes).into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::branch::BranchStatus;
    use crate::ident::Scope;
    use std::path::PathBuf;

    fn oid(n: u8) -> Oid {
        Oid([n; 20])
    }

    /// Store with a linear chain 1 <- 2 <- ... <- n.
    fn chain(n: u8) -> CommitStore {
        let store = CommitStore::new();
        for i in 1..=n {
            let mut commit = Commit::minimal(oid(i));
            if i > 1 {
                commit.parents.push(oid(i - 1));
            }
            commit.message = format!("C{i}");
            store.insert(commit);
        }
        store
    }

    fn branch(id: &str, commits: &[u8]) -> Branch {
        let commits: Vec<Oid> = commits.iter().copied().map(oid).collect();
        Branch {
            id: BranchId::new(id),
            name: id.to_owned(),
            scope: Scope::Local,
            root: PathBuf::from("/repo"),
            head: commits[0],
            status: BranchStatus::Clean,
            commits,
            merging: None,
            linked: BTreeSet::new(),
        }
    }

    #[test]
    fn upsert_materializes_full_ancestry() {
        let store = chain(3);
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[3, 2, 1]);
        assert_eq!(graph.upsert_vertex(oid(3), &main, &store), 3);
        graph.link();
        assert_eq!(graph.len(), 3);
        assert!(graph.commit(&oid(1)).unwrap().children.contains(&oid(2).into()));
        assert!(graph.check_consistency(&[main]).is_ok());
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = chain(3);
        let main = branch("main", &[3, 2, 1]);
        let mut once = Graph::new(RepoId::new("r"));
        once.upsert_vertex(oid(3), &main, &store);
        let mut twice = once.clone();
        assert_eq!(twice.upsert_vertex(oid(3), &main, &store), 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_commit_becomes_terminal_vertex() {
        let store = CommitStore::new();
        let mut commit = Commit::minimal(oid(2));
        commit.parents.push(oid(1));
        store.insert(commit);
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[2, 1]);
        graph.upsert_vertex(oid(2), &main, &store);
        graph.link();
        let terminal = graph.commit(&oid(1)).unwrap();
        assert!(terminal.parents.is_empty());
        assert!(graph.check_consistency(&[main]).is_ok());
    }

    #[test]
    fn removing_last_reference_deletes_and_repairs_parent() {
        let store = chain(3);
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[3, 2, 1]);
        graph.upsert_vertex(oid(3), &main, &store);
        graph.link();

        let reset = branch("main", &[2, 1]);
        assert_eq!(graph.remove_vertex(&oid(3), &main.id, Some(&reset), &store), 1);
        graph.link();
        let parent = graph.commit(&oid(2)).unwrap();
        assert!(parent.children.is_empty());
        assert!(parent.heads.contains(&main.id));
        assert!(graph.check_consistency(&[reset]).is_ok());
    }

    #[test]
    fn deleted_branch_is_not_reattached_to_ancestors() {
        let store = chain(2);
        let mut graph = Graph::new(RepoId::new("r"));
        let topic = branch("topic", &[2, 1]);
        graph.upsert_vertex(oid(2), &topic, &store);
        graph.upsert_vertex(oid(1), &branch("main", &[1]), &store);
        graph.link();
        for commit in &topic.commits {
            graph.remove_vertex(commit, &topic.id, None, &store);
        }
        graph.link();
        assert_eq!(graph.len(), 1);
        let root = graph.commit(&oid(1)).unwrap();
        assert_eq!(root.branches, BTreeSet::from([BranchId::new("main")]));
        assert!(graph.check_consistency(&[branch("main", &[1])]).is_ok());
    }

    #[test]
    fn consistency_check_reports_dangling_children() {
        let store = chain(2);
        let mut graph = Graph::new(RepoId::new("r"));
        graph.upsert_vertex(oid(2), &branch("main", &[2, 1]), &store);
        graph.link();
        graph.vertices.remove(&VertexKey::Commit(oid(2)));
        let err = graph.check_consistency(&[branch("main", &[2, 1])]).unwrap_err();
        assert!(matches!(err, GraphError::InconsistentGraph { .. }));
    }

    #[test]
    fn consistency_check_rejects_unknown_branch_ids() {
        let store = chain(1);
        let mut graph = Graph::new(RepoId::new("r"));
        let topic = branch("topic", &[1]);
        graph.upsert_vertex(oid(1), &topic, &store);
        graph.link();
        assert!(graph.check_consistency(&[topic]).is_ok());
        let err = graph.check_consistency(&[branch("main", &[1])]).unwrap_err();
        assert!(err.to_string().contains("unknown branch topic"));
    }

    /// Store holding `2 <- 3` where 2's parent 1 is absent.
    fn shallow() -> CommitStore {
        let store = CommitStore::new();
        for (i, parent) in [(2, 1), (3, 2)] {
            let mut commit = Commit::minimal(oid(i));
            commit.parents.push(oid(parent));
            commit.message = format!("C{i}");
            store.insert(commit);
        }
        store
    }

    #[test]
    fn deleted_branch_releases_its_terminal_parent() {
        let store = shallow();
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[3]);
        let topic = branch("topic", &[2]);
        graph.upsert_vertex(oid(2), &topic, &store);
        graph.link();
        assert_eq!(graph.commit(&oid(1)).unwrap().branches, BTreeSet::from([topic.id.clone()]));

        graph.remove_vertex(&oid(2), &topic.id, None, &store);
        assert_eq!(graph.detach_stray(&topic.id, None, &store), 1);
        graph.link();
        assert!(graph.is_empty());
        assert!(graph.check_consistency(&[main]).is_ok());
    }

    #[test]
    fn surviving_branch_keeps_terminal_parent_of_listed_commits() {
        let store = shallow();
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[3, 2]);
        graph.upsert_vertex(oid(3), &main, &store);
        graph.link();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.detach_stray(&main.id, Some(&main), &store), 0);

        let reset = branch("main", &[2]);
        graph.remove_vertex(&oid(3), &main.id, Some(&reset), &store);
        assert_eq!(graph.detach_stray(&main.id, Some(&reset), &store), 0);
        assert!(graph.commit(&oid(1)).is_some());
        graph.link();
        assert!(graph.check_consistency(&[reset]).is_ok());

        store.insert(Commit::minimal(oid(5)));
        let moved = branch("main", &[5]);
        graph.remove_vertex(&oid(2), &main.id, Some(&moved), &store);
        graph.upsert_vertex(oid(5), &moved, &store);
        assert_eq!(graph.detach_stray(&main.id, Some(&moved), &store), 1);
        graph.link();
        assert_eq!(graph.len(), 1);
        assert!(graph.check_consistency(&[moved]).is_ok());
    }

    #[test]
    fn resolved_terminal_takes_commit_fields_and_walks_parents() {
        let store = shallow();
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[3, 2]);
        graph.upsert_vertex(oid(3), &main, &store);
        graph.link();
        assert_eq!(graph.resolve_terminal(oid(1), &[main.clone()], &store), 0);

        let mut root = Commit::minimal(oid(1));
        root.parents.push(oid(0));
        root.message = "C1".into();
        store.insert(root);
        store.insert(Commit::minimal(oid(0)));
        assert_eq!(graph.resolve_terminal(oid(1), &[main.clone()], &store), 1);
        graph.link();

        let resolved = graph.commit(&oid(1)).unwrap();
        assert_eq!(resolved.message, "C1");
        assert_eq!(resolved.parents, vec![VertexKey::Commit(oid(0))]);
        assert_eq!(resolved.branches, BTreeSet::from([main.id.clone()]));
        assert!(resolved.children.contains(&oid(2).into()));
        assert!(graph.commit(&oid(0)).unwrap().branches.contains(&main.id));
        assert!(graph.check_consistency(&[main]).is_ok());
    }

    #[test]
    fn digest_tracks_content() {
        let store = chain(2);
        let mut a = Graph::new(RepoId::new("r"));
        a.upsert_vertex(oid(2), &branch("main", &[2, 1]), &store);
        a.link();
        let mut b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        b.upsert_vertex(oid(1), &branch("other", &[1]), &store);
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
