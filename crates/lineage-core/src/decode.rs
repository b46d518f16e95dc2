// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Commit object decoder.
//!
//! Parses the textual commit format into a [`Commit`]:
//!
//! ```text
//! tree <hex>
//! parent <hex>          (zero or more)
//! author <name> <<email>> <epoch> <tz>
//! committer <name> <<email>> <epoch> <tz>   (optional)
//! gpgsig -----BEGIN PGP SIGNATURE-----      (optional, continuation lines start with ' ')
//!
//! <message>
//! ```
//!
//! Multi-line headers (signatures, `mergetag`) are skipped wholesale. Unknown
//! single-line headers are ignored. A loose-object prefix (`commit <len>\0`) is
//! tolerated and stripped. Decoding performs no I/O.
//!
//! Only the SHA-1 object format is supported: `tree` and `parent` values must
//! be 40 hex digits. Objects from SHA-256 repositories decode as
//! [`DecodeError::MalformedObject`] and degrade to minimal vertices.

use thiserror::Error;

use crate::commit::{Commit, Signature};
use crate::ident::Oid;

/// Errors produced by [`decode_commit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload lacks the mandatory header structure.
    #[error("[MALFORMED_OBJECT] {oid}: {reason}")]
    MalformedObject {
        /// Object the payload was fetched for.
        oid: Oid,
        /// Which part of the header was unusable.
        reason: &'static str,
    },
}

const LOOSE_PREFIX: &[u8] = b"commit ";
const SHA256_HEX_LEN: usize = 64;

/// Decode a raw commit object.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedObject`] when the payload is not UTF-8, the
/// `tree` header is missing, or a `tree`/`parent` value is not a SHA-1 oid.
pub fn decode_commit(oid: Oid, raw: &[u8]) -> Result<Commit, DecodeError> {
    let malformed = |reason| DecodeError::MalformedObject { oid, reason };
    let body = strip_loose_prefix(raw);
    let text = std::str::from_utf8(body).map_err(|_| malformed("payload is not valid UTF-8"))?;

    let (header, message) = match text.split_once("\n\n") {
        Some((header, message)) => (header, message),
        None => (text, ""),
    };

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;
    let mut encoding = None;

    for line in header.lines() {
        if line.starts_with(' ') {
            continue;
        }
        let (field, value) = line.split_once(' ').unwrap_or((line, ""));
        match field {
            "tree" => tree = Some(parse_id(value, "tree").map_err(malformed)?),
            "parent" => parents.push(parse_id(value, "parent").map_err(malformed)?),
            "author" => author = Some(parse_signature(value)),
            "committer" => committer = Some(parse_signature(value)),
            "encoding" => encoding = Some(value.to_owned()),
            _ => {}
        }
    }

    let tree = tree.ok_or_else(|| malformed("missing tree header"))?;
    Ok(Commit {
        oid,
        tree: Some(tree),
        parents,
        author: author.unwrap_or_default(),
        committer,
        encoding,
        message: message.trim_end_matches('\n').to_owned(),
    })
}

/// SHA-1 only; a SHA-256 id gets its own reason so the limit is visible.
fn parse_id(value: &str, field: &'static str) -> Result<Oid, &'static str> {
    Oid::from_hex(value).map_err(|_| {
        let sha256 = value.len() == SHA256_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit());
        match (sha256, field) {
            (true, "tree") => "tree id is SHA-256; only SHA-1 repositories are supported",
            (true, _) => "parent id is SHA-256; only SHA-1 repositories are supported",
            (false, "tree") => "invalid tree id",
            (false, _) => "invalid parent id",
        }
    })
}

fn strip_loose_prefix(raw: &[u8]) -> &[u8] {
    if !raw.starts_with(LOOSE_PREFIX) {
        return raw;
    }
    match raw.iter().take(32).position(|b| *b == 0) {
        Some(nul) => &raw[nul + 1..],
        None => raw,
    }
}

/// Parse `Name <email> 1700000000 +0100`.
fn parse_signature(value: &str) -> Signature {
    let Some((name, rest)) = value.split_once('<') else {
        return Signature {
            name: value.trim().to_owned(),
            ..Signature::default()
        };
    };
    let (email, tail) = rest.split_once('>').unwrap_or((rest, ""));
    let timestamp = tail
        .split_whitespace()
        .next()
        .and_then(|secs| secs.parse::<i64>().ok());
    Signature {
        name: name.trim().to_owned(),
        email: email.trim().to_owned(),
        timestamp,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const P1: &str = "1111111111111111111111111111111111111111";
    const P2: &str = "2222222222222222222222222222222222222222";

    fn oid() -> Oid {
        Oid([0xab; 20])
    }

    #[test]
    fn decodes_root_commit_without_committer() {
        let raw = format!(
            "tree {TREE}\nauthor Ada Lovelace <ada@example.com> 1700000000 +0100\n\nInitial commit\n"
        );
        let commit = decode_commit(oid(), raw.as_bytes()).unwrap();
        assert!(commit.is_root());
        assert!(commit.committer.is_none());
        assert_eq!(commit.author.name, "Ada Lovelace");
        assert_eq!(commit.author.email, "ada@example.com");
        assert_eq!(commit.author.timestamp, Some(1_700_000_000));
        assert_eq!(commit.message, "Initial commit");
    }

    #[test]
    fn keeps_parent_order_for_merges() {
        let raw = format!(
            "tree {TREE}\nparent {P1}\nparent {P2}\nauthor A <a@x> 1 +0000\ncommitter C <c@x> 2 -0700\n\nMerge branch 'feature'\n"
        );
        let commit = decode_commit(oid(), raw.as_bytes()).unwrap();
        assert!(commit.is_merge());
        assert_eq!(
            commit.parents,
            vec![Oid::from_hex(P1).unwrap(), Oid::from_hex(P2).unwrap()]
        );
        assert_eq!(commit.committer.unwrap().timestamp, Some(2));
    }

    #[test]
    fn skips_signature_block_without_touching_message() {
        let raw = format!(
            "tree {TREE}\nparent {P1}\nauthor A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\
             gpgsig -----BEGIN PGP SIGNATURE-----\n \n iQEzBAABCAAdFiEE\n =abcd\n -----END PGP SIGNATURE-----\n\n\
             Subject line\n\nBody paragraph.\n"
        );
        let commit = decode_commit(oid(), raw.as_bytes()).unwrap();
        assert_eq!(commit.message, "Subject line\n\nBody paragraph.");
        assert_eq!(commit.summary(), "Subject line");
        assert_eq!(commit.parents.len(), 1);
    }

    #[test]
    fn missing_tree_is_malformed() {
        let raw = b"author A <a@x> 1 +0000\n\nno tree\n";
        let err = decode_commit(oid(), raw).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedObject { reason, .. } if reason == "missing tree header"));
    }

    #[test]
    fn invalid_parent_is_malformed() {
        let raw = format!("tree {TREE}\nparent nothex\n\nmsg");
        assert!(decode_commit(oid(), raw.as_bytes()).is_err());
    }

    #[test]
    fn sha256_parent_names_the_unsupported_format() {
        let parent = "ab".repeat(32);
        let raw = format!("tree {TREE}\nparent {parent}\nauthor A <a@x> 1 +0000\n\nmsg");
        let err = decode_commit(oid(), raw.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedObject { reason, .. }
                if reason == "parent id is SHA-256; only SHA-1 repositories are supported"
        ));
        assert!(err.to_string().starts_with("[MALFORMED_OBJECT]"));
    }

    #[test]
    fn strips_loose_object_prefix_and_reads_encoding() {
        let body = format!("tree {TREE}\nauthor A <a@x> 1 +0000\nencoding ISO-8859-1\n\nhello");
        let mut raw = format!("commit {}\0", body.len()).into_bytes();
        raw.extend_from_slice(body.as_bytes());
        let commit = decode_commit(oid(), &raw).unwrap();
        assert_eq!(commit.encoding.as_deref(), Some("ISO-8859-1"));
        assert_eq!(commit.message, "hello");
    }

    #[test]
    fn unparsable_timestamp_is_none() {
        let raw = format!("tree {TREE}\nauthor Nameless <n@x>\n\nm");
        let commit = decode_commit(oid(), raw.as_bytes()).unwrap();
        assert_eq!(commit.author.timestamp, None);
        assert_eq!(commit.author.email, "n@x");
    }

    #[test]
    fn decoding_is_deterministic() {
        let raw = format!("tree {TREE}\nparent {P1}\nauthor A <a@x> 5 +0000\n\nsame");
        assert_eq!(
            decode_commit(oid(), raw.as_bytes()),
            decode_commit(oid(), raw.as_bytes())
        );
    }
}
