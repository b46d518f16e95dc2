// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deduplicated commit cache.
//!
//! [`CommitStore`] maps an [`Oid`] to its decoded [`Commit`]. Commits are
//! immutable and content-addressed, so one store is shared by every repository
//! and every recomputation cycle; cloning the store clones a handle, not the
//! data.
//!
//! # Absence Semantics
//!
//! [`get`](CommitStore::get) returns `None` for commits not yet fetched. That is
//! not an error: unresolvable objects are never cached so a later cycle can
//! retry them. Malformed objects, on the other hand, are cached as
//! [`Commit::minimal`] since refetching the same bytes cannot help.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::commit::Commit;
use crate::decode::{decode_commit, DecodeError};
use crate::ident::Oid;

/// Shared, cloneable commit cache with an advisory byte budget.
#[derive(Clone, Default)]
pub struct CommitStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    commits: FxHashMap<Oid, Arc<Commit>>,
    byte_count: usize,
    max_bytes: Option<usize>,
}

impl CommitStore {
    /// Create an empty store with no byte limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with an advisory byte budget.
    ///
    /// Inserts always succeed; [`is_over_budget`](CommitStore::is_over_budget)
    /// reports when the budget is exceeded.
    pub fn with_limits(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                max_bytes: Some(max_bytes),
                ..StoreInner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode `raw` and cache the result under `oid`.
    ///
    /// Returns the cached commit if `oid` is already present (the payload is
    /// not decoded again).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedObject`] when decoding fails. A minimal
    /// commit is cached under `oid` in that case so later lookups degrade the
    /// same way.
    pub fn decode_and_insert(&self, oid: Oid, raw: &[u8]) -> Result<Arc<Commit>, DecodeError> {
        if let Some(existing) = self.get(&oid) {
            return Ok(existing);
        }
        let decoded = decode_commit(oid, raw);
        let mut inner = self.lock();
        inner.byte_count += raw.len();
        match decoded {
            Ok(commit) => Ok(Arc::clone(
                inner.commits.entry(oid).or_insert_with(|| Arc::new(commit)),
            )),
            Err(err) => {
                inner
                    .commits
                    .entry(oid)
                    .or_insert_with(|| Arc::new(Commit::minimal(oid)));
                Err(err)
            }
        }
    }

    /// Insert an already-decoded commit. Existing entries win.
    pub fn insert(&self, commit: Commit) -> Arc<Commit> {
        let mut inner = self.lock();
        Arc::clone(
            inner
                .commits
                .entry(commit.oid)
                .or_insert_with(|| Arc::new(commit)),
        )
    }

    /// Retrieve a commit. `None` means not fetched yet.
    pub fn get(&self, oid: &Oid) -> Option<Arc<Commit>> {
        self.lock().commits.get(oid).cloned()
    }

    /// Check existence without cloning the record.
    pub fn has(&self, oid: &Oid) -> bool {
        self.lock().commits.contains_key(oid)
    }

    /// Number of cached commits.
    pub fn len(&self) -> usize {
        self.lock().commits.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().commits.is_empty()
    }

    /// Total raw bytes decoded into the store.
    pub fn byte_count(&self) -> usize {
        self.lock().byte_count
    }

    /// Returns `true` if `byte_count` exceeds the configured budget.
    ///
    /// Always `false` when no budget was set.
    pub fn is_over_budget(&self) -> bool {
        let inner = self.lock();
        inner.max_bytes.is_some_and(|max| inner.byte_count > max)
    }
}

impl std::fmt::Debug for CommitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CommitStore")
            .field("len", &inner.commits.len())
            .field("byte_count", &inner.byte_count)
            .field("max_bytes", &inner.max_bytes)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    fn raw_commit(message: &str) -> Vec<u8> {
        format!("tree {TREE}\nauthor A <a@x> 1 +0000\n\n{message}\n").into_bytes()
    }

    #[test]
    fn decodes_once_and_shares_the_record() {
        let store = CommitStore::new();
        let oid = Oid([1; 20]);
        let first = store.decode_and_insert(oid, &raw_commit("one")).unwrap();
        let second = store.decode_and_insert(oid, &raw_commit("ignored")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.message, "one");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_objects_cache_a_minimal_commit() {
        let store = CommitStore::new();
        let oid = Oid([2; 20]);
        assert!(store.decode_and_insert(oid, b"garbage").is_err());
        let cached = store.get(&oid).unwrap();
        assert!(cached.is_root());
        assert!(cached.message.is_empty());
    }

    #[test]
    fn clones_share_state() {
        let store = CommitStore::new();
        let handle = store.clone();
        handle.insert(Commit::minimal(Oid([3; 20])));
        assert!(store.has(&Oid([3; 20])));
    }

    #[test]
    fn budget_is_advisory() {
        let store = CommitStore::with_limits(8);
        assert!(!store.is_over_budget());
        store
            .decode_and_insert(Oid([4; 20]), &raw_commit("long enough"))
            .unwrap();
        assert!(store.is_over_budget());
        assert_eq!(store.len(), 1);
        assert!(!CommitStore::new().is_over_budget());
    }
}
