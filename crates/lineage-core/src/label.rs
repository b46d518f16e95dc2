// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vertex classification and the compact (chain-collapsed) rendering view.
//!
//! Compaction never touches the [`Graph`]; [`CompactView`] is a derived
//! projection rebuilt from the graph whenever a renderer wants it.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::Graph;
use crate::ident::VertexKey;

/// Structural role of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    /// No parents or no children.
    Terminal,
    /// Exactly one parent and one child.
    Sequential,
    /// More than one child.
    Branching,
    /// More than one parent.
    Merging,
    /// More than two incident edges in total.
    Structural,
}

impl Label {
    const fn bit(self) -> u8 {
        match self {
            Self::Terminal => 1,
            Self::Sequential => 1 << 1,
            Self::Branching => 1 << 2,
            Self::Merging => 1 << 3,
            Self::Structural => 1 << 4,
        }
    }
}

/// Set of [`Label`]s; a vertex may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Labels(u8);

impl Labels {
    /// Returns `true` if `label` is in the set.
    pub fn contains(self, label: Label) -> bool {
        self.0 & label.bit() != 0
    }

    fn with(self, label: Label) -> Self {
        Self(self.0 | label.bit())
    }
}

/// Classify a vertex from its edge counts.
pub fn classify(parents: usize, children: usize) -> Labels {
    let mut labels = Labels::default();
    if parents == 0 || children == 0 {
        labels = labels.with(Label::Terminal);
    }
    if parents == 1 && children == 1 {
        labels = labels.with(Label::Sequential);
    }
    if parents + children > 2 {
        labels = labels.with(Label::Structural);
    }
    if children > 1 {
        labels = labels.with(Label::Branching);
    }
    if parents > 1 {
        labels = labels.with(Label::Merging);
    }
    labels
}

/// Vertex of the compact view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactNode {
    /// Parents after splicing.
    pub parents: Vec<VertexKey>,
    /// Children after splicing.
    pub children: BTreeSet<VertexKey>,
    /// Sequential vertices collapsed into the edge above this node, nearest
    /// first.
    pub collapsed: Vec<VertexKey>,
}

/// Rendering projection with sequential chains spliced out.
///
/// Vertices anchoring a branch head, a conflict, or a placeholder are kept
/// even when sequential, since the renderer draws labels on them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactView {
    nodes: BTreeMap<VertexKey, CompactNode>,
    spliced: usize,
}

impl CompactView {
    /// Build the view, re-evaluating neighbours after every splice.
    pub fn build(graph: &Graph) -> Self {
        let mut nodes: BTreeMap<VertexKey, CompactNode> = graph
            .iter()
            .map(|(key, vertex)| {
                let node = CompactNode {
                    parents: vertex.parents.clone(),
                    children: vertex.children.clone(),
                    collapsed: Vec::new(),
                };
                (key.clone(), node)
            })
            .collect();
        let anchored: BTreeSet<&VertexKey> = graph
            .iter()
            .filter(|(_, v)| !v.heads.is_empty() || !v.conflicted.is_empty() || v.is_placeholder())
            .map(|(key, _)| key)
            .collect();

        let mut spliced = 0;
        let mut work: BTreeSet<VertexKey> = nodes.keys().cloned().collect();
        while let Some(key) = work.pop_first() {
            if anchored.contains(&key) {
                continue;
            }
            let Some(node) = nodes.get(&key) else {
                continue;
            };
            if !classify(node.parents.len(), node.children.len()).contains(Label::Sequential) {
                continue;
            }
            let (Some(parent), Some(child)) =
                (node.parents.first().cloned(), node.children.first().cloned())
            else {
                continue;
            };
            let Some(node) = nodes.remove(&key) else {
                continue;
            };
            if let Some(p) = nodes.get_mut(&parent) {
                p.children.remove(&key);
                p.children.insert(child.clone());
            }
            if let Some(c) = nodes.get_mut(&child) {
                let already_linked = c.parents.contains(&parent);
                if already_linked {
                    c.parents.retain(|k| k != &key);
                } else {
                    for k in &mut c.parents {
                        if k == &key {
                            *k = parent.clone();
                        }
                    }
                }
                c.collapsed.push(key.clone());
                c.collapsed.extend(node.collapsed);
            }
            spliced += 1;
            work.insert(parent);
            work.insert(child);
        }
        Self { nodes, spliced }
    }

    /// Node for `key`, if it survived compaction.
    pub fn node(&self, key: &VertexKey) -> Option<&CompactNode> {
        self.nodes.get(key)
    }

    /// Iterate over surviving nodes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&VertexKey, &CompactNode)> {
        self.nodes.iter()
    }

    /// Number of surviving nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the view is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of vertices spliced out.
    pub fn spliced(&self) -> usize {
        self.spliced
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::branch::{Branch, BranchStatus};
    use crate::commit::Commit;
    use crate::ident::{BranchId, Oid, RepoId, Scope};
    use crate::store::CommitStore;
    use std::path::PathBuf;

    fn oid(n: u8) -> Oid {
        Oid([n; 20])
    }

    fn branch(name: &str, commits: &[u8]) -> Branch {
        let commits: Vec<Oid> = commits.iter().copied().map(oid).collect();
        Branch {
            id: BranchId::new(name),
            name: name.to_owned(),
            scope: Scope::Local,
            root: PathBuf::from("/repo"),
            head: commits[0],
            status: BranchStatus::Clean,
            commits,
            merging: None,
            linked: BTreeSet::new(),
        }
    }

    /// Chain 1 <- 2 <- 3 <- 4; `main` points at 4, `side` at 2.
    fn chain() -> Graph {
        let store = CommitStore::new();
        for n in 1..=4u8 {
            let mut commit = Commit::minimal(oid(n));
            if n > 1 {
                commit.parents = vec![oid(n - 1)];
            }
            store.insert(commit);
        }
        let mut graph = Graph::new(RepoId::new("r"));
        let main = branch("main", &[4, 3, 2, 1]);
        let side = branch("side", &[2, 1]);
        for n in [1, 2, 3, 4] {
            graph.upsert_vertex(oid(n), &main, &store);
        }
        for n in [1, 2] {
            graph.upsert_vertex(oid(n), &side, &store);
        }
        graph.link();
        graph
    }

    #[test]
    fn heads_anchor_sequential_vertices() {
        let graph = chain();
        let view = CompactView::build(&graph);
        assert_eq!(view.spliced(), 1);
        assert_eq!(view.len(), 3);
        assert!(view.node(&VertexKey::Commit(oid(3))).is_none());
        let head = view.node(&VertexKey::Commit(oid(4))).unwrap();
        assert_eq!(head.parents, vec![VertexKey::Commit(oid(2))]);
        assert_eq!(head.collapsed, vec![VertexKey::Commit(oid(3))]);
        let side = view.node(&VertexKey::Commit(oid(2))).unwrap();
        assert_eq!(side.children, BTreeSet::from([VertexKey::Commit(oid(4))]));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn classification_rules() {
        let root = classify(0, 1);
        assert!(root.contains(Label::Terminal));
        assert!(!root.contains(Label::Sequential));

        let middle = classify(1, 1);
        assert!(middle.contains(Label::Sequential));
        assert!(!middle.contains(Label::Structural));

        let fork = classify(1, 2);
        assert!(fork.contains(Label::Branching));
        assert!(fork.contains(Label::Structural));

        let merge = classify(2, 1);
        assert!(merge.contains(Label::Merging));
        assert!(merge.contains(Label::Structural));
        assert!(!merge.contains(Label::Terminal));
    }
}
