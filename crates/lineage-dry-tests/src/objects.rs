// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builder for raw commit object payloads.

use lineage_core::Oid;

const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Builds the textual commit format accepted by
/// [`decode_commit`](lineage_core::decode_commit).
///
/// # Example
///
/// ```
/// use lineage_core::decode_commit;
/// use lineage_dry_tests::{make_oid, CommitObjectBuilder};
///
/// let parent = make_oid("C1");
/// let raw = CommitObjectBuilder::new("second").parent(parent).build();
/// let commit = decode_commit(make_oid("C2"), &raw).unwrap();
/// assert_eq!(commit.parents, vec![parent]);
/// assert_eq!(commit.message, "second");
/// ```
#[derive(Debug, Clone)]
pub struct CommitObjectBuilder {
    tree: Option<String>,
    parents: Vec<Oid>,
    author: String,
    committer: Option<String>,
    encoding: Option<String>,
    signature: Option<String>,
    message: String,
    loose_header: bool,
}

impl CommitObjectBuilder {
    /// A commit with the empty tree, a fixed author and committer, and
    /// `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            tree: Some(EMPTY_TREE.to_owned()),
            parents: Vec::new(),
            author: "Ada Lovelace <ada@example.com> 1700000000 +0000".to_owned(),
            committer: Some("Ada Lovelace <ada@example.com> 1700000000 +0000".to_owned()),
            encoding: None,
            signature: None,
            message: message.into(),
            loose_header: false,
        }
    }

    /// Append a parent (order is preserved).
    pub fn parent(mut self, oid: Oid) -> Self {
        self.parents.push(oid);
        self
    }

    /// Append several parents.
    pub fn parents(mut self, oids: impl IntoIterator<Item = Oid>) -> Self {
        self.parents.extend(oids);
        self
    }

    /// Raw author line value (`name <email> epoch tz`).
    pub fn author(mut self, line: impl Into<String>) -> Self {
        self.author = line.into();
        self
    }

    /// Raw committer line value; `None` omits the header.
    pub fn committer(mut self, line: Option<&str>) -> Self {
        self.committer = line.map(str::to_owned);
        self
    }

    /// Add an `encoding` header.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Add a multi-line `gpgsig` header.
    pub fn signed(mut self) -> Self {
        self.signature = Some(
            "-----BEGIN PGP SIGNATURE-----\n \n iQEzBAABCAAdFiEE\n -----END PGP SIGNATURE-----"
                .to_owned(),
        );
        self
    }

    /// Drop the `tree` header, producing a malformed object.
    pub fn without_tree(mut self) -> Self {
        self.tree = None;
        self
    }

    /// Prefix the payload with the loose-object header `commit <len>\0`.
    pub fn loose(mut self) -> Self {
        self.loose_header = true;
        self
    }

    /// Render the payload bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut text = String::new();
        if let Some(tree) = &self.tree {
            text.push_str(&format!("tree {tree}\n"));
        }
        for parent in &self.parents {
            text.push_str(&format!("parent {parent}\n"));
        }
        text.push_str(&format!("author {}\n", self.author));
        if let Some(committer) = &self.committer {
            text.push_str(&format!("committer {committer}\n"));
        }
        if let Some(encoding) = &self.encoding {
            text.push_str(&format!("encoding {encoding}\n"));
        }
        if let Some(signature) = &self.signature {
            text.push_str(&format!("gpgsig {signature}\n"));
        }
        text.push('\n');
        text.push_str(&self.message);
        text.push('\n');

        if !self.loose_header {
            return text.into_bytes();
        }
        let mut bytes = format!("commit {}\0", text.len()).into_bytes();
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }
}
