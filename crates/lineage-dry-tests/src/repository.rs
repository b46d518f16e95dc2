// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory [`RepositorySource`] for engine tests.

use std::collections::{BTreeMap, BTreeSet};
use std::future::{ready, Future};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lineage_core::{Branch, Oid, RepositorySource, SourceError};

use crate::objects::CommitObjectBuilder;
use crate::oids::make_oid;

/// Scripted repository: objects, branch listing, and upstream names live in
/// memory; every call is counted.
///
/// Clones share state. Mutating the fake between engine cycles simulates the
/// repository changing underneath the engine.
///
/// # Example
///
/// ```
/// use lineage_dry_tests::{BranchBuilder, FakeRepository};
///
/// let repo = FakeRepository::new();
/// let c1 = repo.commit("C1", &[]);
/// let c2 = repo.commit("C2", &[c1]);
/// repo.set_branches(vec![BranchBuilder::local("main").commits([c2, c1]).build()]);
/// assert_eq!(repo.object_count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct FakeRepository {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Oid, Vec<u8>>,
    branches: Vec<Branch>,
    upstreams: BTreeMap<String, String>,
    missing: BTreeSet<Oid>,
    fail_listing: bool,
    fetches: BTreeMap<Oid, usize>,
    list_count: usize,
    upstream_count: usize,
}

impl FakeRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a well-formed commit whose oid and message derive from `label`.
    pub fn commit(&self, label: &str, parents: &[Oid]) -> Oid {
        let oid = make_oid(label);
        let raw = CommitObjectBuilder::new(label)
            .parents(parents.iter().copied())
            .build();
        self.insert_object(oid, raw);
        oid
    }

    /// Store a linear history `labels[0] <- labels[1] <- ...` on top of
    /// `base` and return the oids head first, the order a branch lists them.
    pub fn linear(&self, labels: &[&str], base: Option<Oid>) -> Vec<Oid> {
        let mut parent = base;
        let mut oids: Vec<Oid> = labels
            .iter()
            .map(|label| {
                let parents: Vec<Oid> = parent.into_iter().collect();
                let oid = self.commit(label, &parents);
                parent = Some(oid);
                oid
            })
            .collect();
        oids.reverse();
        oids
    }

    /// Store an arbitrary payload under `oid`.
    pub fn insert_object(&self, oid: Oid, raw: Vec<u8>) {
        self.lock().objects.insert(oid, raw);
    }

    /// Make `get_object(oid)` fail with [`SourceError::NotFound`].
    pub fn mark_missing(&self, oid: Oid) {
        self.lock().missing.insert(oid);
    }

    /// Undo [`mark_missing`](Self::mark_missing).
    pub fn restore(&self, oid: Oid) {
        self.lock().missing.remove(&oid);
    }

    /// Replace the branch listing.
    pub fn set_branches(&self, branches: Vec<Branch>) {
        self.lock().branches = branches;
    }

    /// Make `list_branches` fail.
    pub fn set_fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }

    /// Record that local branch `name` tracks `remote`.
    pub fn set_upstream(&self, name: impl Into<String>, remote: impl Into<String>) {
        self.lock().upstreams.insert(name.into(), remote.into());
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// `get_object` calls for `oid`.
    pub fn fetch_count(&self, oid: &Oid) -> usize {
        self.lock().fetches.get(oid).copied().unwrap_or(0)
    }

    /// `get_object` calls in total.
    pub fn total_fetches(&self) -> usize {
        self.lock().fetches.values().sum()
    }

    /// `list_branches` calls.
    pub fn list_count(&self) -> usize {
        self.lock().list_count
    }

    /// `get_upstream_remote` calls.
    pub fn upstream_count(&self) -> usize {
        self.lock().upstream_count
    }
}

impl RepositorySource for FakeRepository {
    fn list_branches(
        &self,
        _root: &Path,
    ) -> impl Future<Output = Result<Vec<Branch>, SourceError>> + Send {
        let mut inner = self.lock();
        inner.list_count += 1;
        let result = if inner.fail_listing {
            Err(SourceError::Other("simulated listing failure".into()))
        } else {
            Ok(inner.branches.clone())
        };
        ready(result)
    }

    fn get_object(
        &self,
        _root: &Path,
        oid: Oid,
    ) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send {
        let mut inner = self.lock();
        *inner.fetches.entry(oid).or_insert(0) += 1;
        let result = if inner.missing.contains(&oid) {
            Err(SourceError::NotFound(oid.to_string()))
        } else {
            inner
                .objects
                .get(&oid)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(oid.to_string()))
        };
        ready(result)
    }

    fn get_upstream_remote(
        &self,
        _root: &Path,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, SourceError>> + Send {
        let mut inner = self.lock();
        inner.upstream_count += 1;
        ready(Ok(inner.upstreams.get(name).cloned()))
    }
}
