// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic topological ordering of the commit graph.

use std::collections::{btree_set, BTreeSet};

use crate::graph::Graph;
use crate::ident::VertexKey;

/// Reverse-postorder DFS over `children`, parents first.
///
/// Start vertices and children are visited in key order, so a given graph
/// state always yields the same ordering. The walk uses an explicit stack;
/// history depth does not grow the call stack.
pub fn topological_order(graph: &Graph) -> Vec<VertexKey> {
    let mut visited: BTreeSet<&VertexKey> = BTreeSet::new();
    let mut postorder: Vec<VertexKey> = Vec::with_capacity(graph.len());

    for (start, vertex) in graph.iter() {
        if !visited.insert(start) {
            continue;
        }
        let mut stack: Vec<(&VertexKey, btree_set::Iter<'_, VertexKey>)> =
            vec![(start, vertex.children.iter())];
        loop {
            let next = match stack.last_mut() {
                Some((_, children)) => children.next(),
                None => break,
            };
            match next {
                Some(child) => {
                    if let Some((key, vertex)) = graph.vertices.get_key_value(child) {
                        if visited.insert(key) {
                            stack.push((key, vertex.children.iter()));
                        }
                    }
                }
                None => {
                    if let Some((key, _)) = stack.pop() {
                        postorder.push(key.clone());
                    }
                }
            }
        }
    }

    postorder.reverse();
    postorder
}
