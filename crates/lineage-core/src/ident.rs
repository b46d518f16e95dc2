// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types: object ids, repositories, branches, and graph vertex keys.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length in bytes of a repository object id.
pub const OID_LEN: usize = 20;

/// Content-addressed commit identifier.
///
/// `Oid` is the raw 20-byte object hash. It parses from and renders as 40
/// lowercase hex characters; uppercase input is accepted.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid(pub [u8; OID_LEN]);

impl Oid {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; OID_LEN] {
        &self.0
    }

    /// Parses a 40-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, OidError> {
        let mut bytes = [0u8; OID_LEN];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|_| OidError::InvalidHex(hex_str.to_owned()))?;
        Ok(Self(bytes))
    }

    /// Abbreviated (8 hex chars) form used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Error returned when an object id cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OidError {
    /// The input was not exactly 40 hex characters.
    #[error("invalid object id: {0:?}")]
    InvalidHex(String),
}

/// Identifier of a repository tracked by the engine.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct RepoId(pub String);

impl RepoId {
    /// Creates a repository id from any string-like label.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a branch, stable across snapshots.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct BranchId(pub String);

impl BranchId {
    /// Creates a branch id from any string-like label.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Whether a branch is local or a remote-tracking reference.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A branch in the local repository.
    Local,
    /// A remote-tracking reference.
    Remote,
}

impl Scope {
    /// Lowercase label used in scoped names (`local/main`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a vertex in the commit graph.
///
/// Real commits are keyed by their [`Oid`]. Placeholder vertices carry the
/// scoped branch name they belong to; being separate variants, they can never
/// collide with an object id. Ordering is total and stable, which the
/// topological sorter relies on.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum VertexKey {
    /// A real commit.
    Commit(Oid),
    /// Staged-but-uncommitted changes on a branch (`"{scope}/{ref}*"`).
    Staged {
        /// Scope of the owning branch.
        scope: Scope,
        /// Ref name of the owning branch.
        name: String,
    },
    /// An unresolved merge on a branch (`"{scope}/{ref}<>{merging}"`).
    Conflict {
        /// Scope of the owning branch.
        scope: Scope,
        /// Ref name of the owning branch.
        name: String,
        /// Ref being merged into the branch.
        merging: String,
    },
}

impl VertexKey {
    /// Returns the object id for commit keys.
    pub fn oid(&self) -> Option<Oid> {
        match self {
            Self::Commit(oid) => Some(*oid),
            Self::Staged { .. } | Self::Conflict { .. } => None,
        }
    }

    /// Returns `true` for synthetic (staged or conflict) keys.
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Self::Commit(_))
    }
}

impl From<Oid> for VertexKey {
    fn from(oid: Oid) -> Self {
        Self::Commit(oid)
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit(oid) => write!(f, "{oid}"),
            Self::Staged { scope, name } => write!(f, "{scope}/{name}*"),
            Self::Conflict {
                scope,
                name,
                merging,
            } => write!(f, "{scope}/{name}<>{merging}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn oid_hex_round_trips_through_display() {
        let oid = Oid::from_hex(HEX).unwrap();
        assert_eq!(oid.to_string(), HEX);
        assert_eq!(oid.short(), "01234567");
        assert_eq!(HEX.to_uppercase().parse::<Oid>().unwrap(), oid);
    }

    #[test]
    fn oid_rejects_wrong_length_and_non_hex() {
        assert!(Oid::from_hex("abc").is_err());
        assert!(Oid::from_hex(&HEX.replace('a', "z")).is_err());
        assert!(Oid::from_hex(&format!("{HEX}00")).is_err());
    }

    #[test]
    fn placeholder_keys_render_scoped_names() {
        let staged = VertexKey::Staged {
            scope: Scope::Local,
            name: "main".into(),
        };
        let conflict = VertexKey::Conflict {
            scope: Scope::Remote,
            name: "main".into(),
            merging: "feature".into(),
        };
        assert_eq!(staged.to_string(), "local/main*");
        assert_eq!(conflict.to_string(), "remote/main<>feature");
        assert!(staged.is_placeholder());
        assert!(conflict.oid().is_none());
    }

    #[test]
    fn commit_keys_sort_before_placeholders() {
        let commit = VertexKey::Commit(Oid([0xff; OID_LEN]));
        let staged = VertexKey::Staged {
            scope: Scope::Local,
            name: "a".into(),
        };
        assert!(commit < staged);
    }
}
