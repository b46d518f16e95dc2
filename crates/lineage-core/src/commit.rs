// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Normalized commit records produced by the object decoder.

use serde::{Deserialize, Serialize};

use crate::ident::Oid;

/// Identity line of a commit (`author` or `committer`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address without the angle brackets.
    pub email: String,
    /// Epoch seconds. The timezone offset is not retained.
    pub timestamp: Option<i64>,
}

/// Immutable commit record.
///
/// Created once per oid and shared across branches behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Object id of the commit.
    pub oid: Oid,
    /// Root tree of the commit; `None` only for minimal records.
    pub tree: Option<Oid>,
    /// Parent commits in recorded order (empty for roots).
    pub parents: Vec<Oid>,
    /// Author identity.
    pub author: Signature,
    /// Committer identity, when the object carries one.
    pub committer: Option<Signature>,
    /// Declared message encoding, when not the default.
    pub encoding: Option<String>,
    /// Free-form message with trailing newlines stripped.
    pub message: String,
}

impl Commit {
    /// Minimal record used when an object is malformed or cannot be fetched.
    ///
    /// It has no parents, so the vertex built from it is terminal.
    pub fn minimal(oid: Oid) -> Self {
        Self {
            oid,
            tree: None,
            parents: Vec::new(),
            author: Signature::default(),
            committer: None,
            encoding: None,
            message: String::new(),
        }
    }

    /// Returns `true` when the commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` for merge commits (two or more parents).
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}
