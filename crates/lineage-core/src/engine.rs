// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recomputation engine: per-repository state, cycles, and stale discard.
//!
//! A cycle is split in three steps so that overlapping snapshots never mutate
//! the same graph:
//!
//! 1. [`Engine::begin`] bumps the repository generation and hands out an owned
//!    copy of the previous state.
//! 2. [`Recomputation::run`] diffs, fetches, and rebuilds that copy. It only
//!    suspends at fetch boundaries and bails out with [`CycleError::Stale`] as
//!    soon as it notices a newer generation.
//! 3. [`Engine::commit`] installs the result only if its generation is still
//!    the latest (last snapshot wins).
//!
//! [`Engine::refresh`] chains the three steps for the common case.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::branch::{compare_branch, Branch, BranchLookup};
use crate::config::EngineConfig;
use crate::diff::{detect_changes, TrackedField};
use crate::graph::{Graph, GraphError, Hash32};
use crate::ident::{BranchId, Oid, RepoId, VertexKey};
use crate::label::CompactView;
use crate::source::{RepositorySource, SourceError};
use crate::store::CommitStore;
use crate::topo::topological_order;

/// Errors surfaced by [`Engine`] entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The repository was never opened (or has been closed).
    #[error("unknown repository: {0}")]
    UnknownRepo(RepoId),
    /// Branch listing failed; without a snapshot nothing can be computed.
    #[error("repository source failed: {0}")]
    Source(#[from] SourceError),
    /// Internal invariant violation.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors that end a [`Recomputation`] early.
#[derive(Debug, Error)]
pub enum CycleError {
    /// A newer snapshot superseded this cycle; its work must be discarded.
    #[error("[STALE_RECOMPUTATION] generation {generation} superseded by {latest}")]
    Stale {
        /// Generation this cycle was started with.
        generation: u64,
        /// Latest generation of the repository.
        latest: u64,
    },
    /// Internal invariant violation.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Counters and degraded objects from one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Branches only in the new snapshot.
    pub branches_added: usize,
    /// Branches only in the old snapshot.
    pub branches_removed: usize,
    /// Branches with tracked differences.
    pub branches_modified: usize,
    /// Real vertices created.
    pub vertices_created: usize,
    /// Real vertices deleted.
    pub vertices_removed: usize,
    /// Placeholders created or replaced.
    pub placeholders_synthesized: usize,
    /// Placeholders deleted.
    pub placeholders_retired: usize,
    /// Child links added by the linker.
    pub links_added: usize,
    /// Objects that failed to decode (minimal vertices were created).
    pub malformed: Vec<Oid>,
    /// Objects that could not be fetched (terminal vertices were created or
    /// kept). Retried on every later cycle while their vertex exists.
    pub unresolved: Vec<Oid>,
    /// Terminal vertices rebuilt from a commit fetched this cycle.
    pub terminals_resolved: usize,
}

/// Result of [`Engine::commit`] or [`Engine::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle's view is now the repository's current view.
    Applied(CycleSummary),
    /// A newer generation exists (or the repository was closed).
    Discarded {
        /// Generation of the discarded cycle.
        generation: u64,
    },
}

impl CycleOutcome {
    /// Returns `true` for [`CycleOutcome::Applied`].
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Published state of one repository, consumed by the rendering layer.
#[derive(Debug, Clone)]
pub struct RepoView {
    repo: RepoId,
    root: PathBuf,
    generation: u64,
    graph: Graph,
    order: Vec<VertexKey>,
    lookup: BranchLookup,
    branches: Vec<Branch>,
    upstreams: BTreeMap<BranchId, String>,
    compact: Option<CompactView>,
    digest: Hash32,
    unresolved: BTreeSet<Oid>,
}

impl RepoView {
    fn empty(repo: RepoId, root: PathBuf) -> Self {
        let graph = Graph::new(repo.clone());
        let digest = graph.digest().unwrap_or_default();
        Self {
            repo,
            root,
            generation: 0,
            graph,
            order: Vec::new(),
            lookup: BranchLookup::default(),
            branches: Vec::new(),
            upstreams: BTreeMap::new(),
            compact: None,
            digest,
            unresolved: BTreeSet::new(),
        }
    }

    /// Repository this view belongs to.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Working-tree root of the repository.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generation of the cycle that produced this view (0 before any cycle).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The commit graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Topological order of the graph, parents first.
    pub fn order(&self) -> &[VertexKey] {
        &self.order
    }

    /// Head oid per scoped branch name.
    pub fn lookup(&self) -> &BranchLookup {
        &self.lookup
    }

    /// Branch snapshot the view was computed from, ordered by id.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Branch record by id.
    pub fn branch(&self, id: &BranchId) -> Option<&Branch> {
        self.branches.iter().find(|branch| &branch.id == id)
    }

    /// Upstream remote names of local branches.
    pub fn upstreams(&self) -> &BTreeMap<BranchId, String> {
        &self.upstreams
    }

    /// `"{remote}/{ref}"` for a local branch that tracks an upstream.
    pub fn qualified_ref(&self, id: &BranchId) -> Option<String> {
        let branch = self.branch(id)?;
        let remote = self.upstreams.get(id)?;
        Some(format!("{remote}/{}", branch.name))
    }

    /// Compact rendering view, when enabled in the config.
    pub fn compact(&self) -> Option<&CompactView> {
        self.compact.as_ref()
    }

    /// BLAKE3 digest of the graph.
    pub fn digest(&self) -> &Hash32 {
        &self.digest
    }

    /// Oids of terminal vertices whose objects could not be fetched yet.
    pub fn unresolved(&self) -> &BTreeSet<Oid> {
        &self.unresolved
    }
}

/// Output of [`Recomputation::run`], to be handed to [`Engine::commit`].
#[derive(Debug, Clone)]
pub struct CycleOutput {
    generation: u64,
    view: RepoView,
    summary: CycleSummary,
}

impl CycleOutput {
    /// Generation the cycle was started with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// View that will be installed on commit.
    pub fn view(&self) -> &RepoView {
        &self.view
    }

    /// Cycle counters.
    pub fn summary(&self) -> &CycleSummary {
        &self.summary
    }
}

#[derive(Debug, Clone)]
struct GenerationGuard {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl GenerationGuard {
    fn check(&self) -> Result<(), CycleError> {
        let latest = self.latest.load(Ordering::Acquire);
        if latest == self.generation {
            Ok(())
        } else {
            Err(CycleError::Stale {
                generation: self.generation,
                latest,
            })
        }
    }
}

struct RepoState {
    generation: Arc<AtomicU64>,
    view: RepoView,
}

/// Owns per-repository graph state and the shared commit store.
pub struct Engine {
    config: EngineConfig,
    commits: CommitStore,
    repos: BTreeMap<RepoId, RepoState>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Creates an engine with no repositories.
    pub fn new(config: EngineConfig) -> Self {
        let commits = match config.commit_store_budget_bytes {
            Some(budget) => CommitStore::with_limits(budget),
            None => CommitStore::new(),
        };
        Self {
            config,
            commits,
            repos: BTreeMap::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared commit cache.
    pub fn commit_store(&self) -> &CommitStore {
        &self.commits
    }

    /// Start tracking `repo`. Returns `false` if it was already open.
    pub fn open_repo(&mut self, repo: RepoId, root: impl Into<PathBuf>) -> bool {
        if self.repos.contains_key(&repo) {
            return false;
        }
        let view = RepoView::empty(repo.clone(), root.into());
        self.repos.insert(
            repo,
            RepoState {
                generation: Arc::new(AtomicU64::new(0)),
                view,
            },
        );
        true
    }

    /// Stop tracking `repo`, returning its last view. In-flight cycles for it
    /// become stale.
    pub fn close_repo(&mut self, repo: &RepoId) -> Option<RepoView> {
        let state = self.repos.remove(repo)?;
        state.generation.fetch_add(1, Ordering::AcqRel);
        Some(state.view)
    }

    /// Current view of `repo`.
    pub fn view(&self, repo: &RepoId) -> Option<&RepoView> {
        self.repos.get(repo).map(|state| &state.view)
    }

    /// Open a cycle for a new branch snapshot of `repo`.
    ///
    /// Any cycle begun earlier for the same repository becomes stale.
    pub fn begin(&self, repo: &RepoId, branches: Vec<Branch>) -> Result<Recomputation, EngineError> {
        let state = self
            .repos
            .get(repo)
            .ok_or_else(|| EngineError::UnknownRepo(repo.clone()))?;
        let generation = state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(repo = %repo, generation, branches = branches.len(), "cycle begun");
        Ok(Recomputation {
            repo: repo.clone(),
            root: state.view.root.clone(),
            guard: GenerationGuard {
                generation,
                latest: Arc::clone(&state.generation),
            },
            graph: state.view.graph.clone(),
            previous: state.view.branches.clone(),
            branches,
            upstreams: state.view.upstreams.clone(),
            unresolved: state.view.unresolved.clone(),
            commits: self.commits.clone(),
            config: self.config.clone(),
        })
    }

    /// Install a finished cycle unless a newer one was begun since.
    pub fn commit(&mut self, output: CycleOutput) -> CycleOutcome {
        let generation = output.generation;
        let Some(state) = self.repos.get_mut(&output.view.repo) else {
            debug!(repo = %output.view.repo, generation, "repository closed; discarding cycle");
            return CycleOutcome::Discarded { generation };
        };
        let latest = state.generation.load(Ordering::Acquire);
        if latest != generation {
            debug!(generation, latest, "discarding stale cycle");
            return CycleOutcome::Discarded { generation };
        }
        info!(
            repo = %output.view.repo,
            generation,
            vertices = output.view.graph.len(),
            "cycle applied"
        );
        state.view = output.view;
        CycleOutcome::Applied(output.summary)
    }

    /// List branches, recompute, and commit in one call.
    ///
    /// Stale cycles are discarded silently (`Ok(Discarded)`).
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn refresh<S: RepositorySource>(
        &mut self,
        source: &S,
        repo: &RepoId,
    ) -> Result<CycleOutcome, EngineError> {
        let root = self
            .view(repo)
            .ok_or_else(|| EngineError::UnknownRepo(repo.clone()))?
            .root()
            .to_path_buf();
        let branches = source.list_branches(&root).await?;
        let cycle = self.begin(repo, branches)?;
        match cycle.run(source).await {
            Ok(output) => Ok(self.commit(output)),
            Err(CycleError::Stale { generation, latest }) => {
                debug!(generation, latest, "recomputation superseded");
                Ok(CycleOutcome::Discarded { generation })
            }
            Err(CycleError::Graph(err)) => Err(err.into()),
        }
    }
}

/// One in-flight cycle over an owned copy of a repository's state.
pub struct Recomputation {
    repo: RepoId,
    root: PathBuf,
    guard: GenerationGuard,
    graph: Graph,
    previous: Vec<Branch>,
    branches: Vec<Branch>,
    upstreams: BTreeMap<BranchId, String>,
    unresolved: BTreeSet<Oid>,
    commits: CommitStore,
    config: EngineConfig,
}

impl Recomputation {
    /// Generation this cycle was started with.
    pub fn generation(&self) -> u64 {
        self.guard.generation
    }

    /// Returns `true` while no newer cycle has been begun.
    pub fn is_current(&self) -> bool {
        self.guard.check().is_ok()
    }

    /// Run the cycle: diff, fetch, remove, upsert, synthesize placeholders,
    /// link, sort.
    ///
    /// # Errors
    ///
    /// [`CycleError::Stale`] when a newer cycle was begun before this one
    /// finished; [`CycleError::Graph`] if the result violates a graph
    /// invariant (checked in debug builds, or always with
    /// `verify_consistency`).
    #[instrument(skip(self, source), fields(repo = %self.repo, generation = self.guard.generation))]
    pub async fn run<S: RepositorySource>(self, source: &S) -> Result<CycleOutput, CycleError> {
        let Self {
            repo,
            root,
            guard,
            mut graph,
            previous,
            mut branches,
            mut upstreams,
            unresolved,
            commits,
            config,
        } = self;
        guard.check()?;

        branches.sort_by(|a, b| a.id.cmp(&b.id));
        branches.dedup_by(|later, earlier| later.id == earlier.id);
        let delta = detect_changes(&previous, &branches);
        debug!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            modified = delta.modified.len(),
            "branch delta"
        );
        let mut summary = CycleSummary {
            branches_added: delta.added.len(),
            branches_removed: delta.removed.len(),
            branches_modified: delta.modified.len(),
            ..CycleSummary::default()
        };

        let live: BTreeSet<&BranchId> = branches.iter().map(|branch| &branch.id).collect();
        let retry: Vec<Oid> = unresolved
            .iter()
            .copied()
            .filter(|oid| {
                graph
                    .commit(oid)
                    .is_some_and(|vertex| vertex.branches.iter().any(|id| live.contains(id)))
            })
            .collect();
        let seeds = delta
            .added
            .iter()
            .flat_map(|branch| branch.commits.iter().copied())
            .chain(
                delta
                    .modified
                    .iter()
                    .flat_map(|change| change.added_commits.iter().copied()),
            )
            .chain(retry);
        let fetched = fetch_objects(
            source,
            &root,
            &commits,
            seeds,
            config.fetch_concurrency,
            &guard,
        )
        .await?;
        summary.malformed = fetched.malformed;
        summary.unresolved = fetched.unresolved;

        for branch in &delta.removed {
            upstreams.remove(&branch.id);
        }
        if config.resolve_upstreams {
            for branch in delta.added.iter().filter(|branch| branch.is_local()) {
                match source.get_upstream_remote(&root, &branch.name).await {
                    Ok(Some(remote)) => {
                        upstreams.insert(branch.id.clone(), remote);
                    }
                    Ok(None) => {
                        upstreams.remove(&branch.id);
                    }
                    Err(err) => {
                        warn!(branch = %branch.id, error = %err, "upstream lookup failed");
                    }
                }
                guard.check()?;
            }
        }

        for branch in &delta.removed {
            for oid in &branch.commits {
                summary.vertices_removed += graph.remove_vertex(oid, &branch.id, None, &commits);
            }
            summary.vertices_removed += graph.detach_stray(&branch.id, None, &commits);
            summary.placeholders_retired += graph.retire_placeholders(branch);
        }
        for change in &delta.modified {
            let current = change.current;
            for oid in &change.removed_commits {
                summary.vertices_removed +=
                    graph.remove_vertex(oid, &current.id, Some(current), &commits);
            }
            if !change.removed_commits.is_empty() {
                summary.vertices_removed +=
                    graph.detach_stray(&current.id, Some(current), &commits);
            }
        }

        for branch in &delta.added {
            for oid in branch.commits.iter().rev() {
                summary.vertices_created += graph.upsert_vertex(*oid, branch, &commits);
            }
        }
        for change in &delta.modified {
            let current = change.current;
            for oid in change.added_commits.iter().rev() {
                summary.vertices_created += graph.upsert_vertex(*oid, current, &commits);
            }
            let recolor = change.changed(TrackedField::Head)
                || change.changed(TrackedField::Status)
                || change.changed(TrackedField::Merging);
            if recolor {
                for head in [change.previous.head, current.head] {
                    if current.contains(&head) && graph.contains(&VertexKey::Commit(head)) {
                        graph.upsert_vertex(head, current, &commits);
                    }
                }
            }
        }

        for oid in &unresolved {
            if commits.has(oid) && graph.contains(&VertexKey::Commit(*oid)) {
                summary.vertices_created += graph.resolve_terminal(*oid, &branches, &commits);
                summary.terminals_resolved += 1;
            }
        }
        let unresolved: BTreeSet<Oid> = unresolved
            .into_iter()
            .chain(summary.unresolved.iter().copied())
            .filter(|oid| !commits.has(oid) && graph.contains(&VertexKey::Commit(*oid)))
            .collect();

        let previous_by_id: BTreeMap<&BranchId, &Branch> =
            previous.iter().map(|branch| (&branch.id, branch)).collect();
        for branch in &branches {
            let changes = graph.synthesize_placeholders(
                previous_by_id.get(&branch.id).copied(),
                branch,
                compare_branch(branch, &branches),
                &config.staged_message,
            );
            summary.placeholders_synthesized += changes.synthesized;
            summary.placeholders_retired += changes.retired;
        }

        summary.links_added = graph.link();
        if cfg!(debug_assertions) || config.verify_consistency {
            graph.check_consistency(&branches)?;
        }
        let order = topological_order(&graph);
        let compact = config.compact_view.then(|| CompactView::build(&graph));
        let lookup = BranchLookup::from_branches(&branches);
        let digest = graph.digest()?;
        guard.check()?;

        debug!(
            vertices = graph.len(),
            created = summary.vertices_created,
            removed = summary.vertices_removed,
            "cycle computed"
        );
        Ok(CycleOutput {
            generation: guard.generation,
            view: RepoView {
                repo,
                root,
                generation: guard.generation,
                graph,
                order,
                lookup,
                branches,
                upstreams,
                compact,
                digest,
                unresolved,
            },
            summary,
        })
    }
}

#[derive(Default)]
struct Fetched {
    malformed: Vec<Oid>,
    unresolved: Vec<Oid>,
}

/// Fetch every seed missing from the store, chasing parents until they are
/// cached or found unresolvable. Each wave's requests are issued concurrently.
async fn fetch_objects<S: RepositorySource>(
    source: &S,
    root: &Path,
    commits: &CommitStore,
    seeds: impl IntoIterator<Item = Oid>,
    wave_size: usize,
    guard: &GenerationGuard,
) -> Result<Fetched, CycleError> {
    let mut fetched = Fetched::default();
    let mut attempted: FxHashSet<Oid> = FxHashSet::default();
    let mut pending: Vec<Oid> = Vec::new();
    for seed in seeds {
        match commits.get(&seed) {
            Some(commit) => {
                for parent in &commit.parents {
                    if !commits.has(parent) && attempted.insert(*parent) {
                        pending.push(*parent);
                    }
                }
            }
            None => {
                if attempted.insert(seed) {
                    pending.push(seed);
                }
            }
        }
    }

    let wave_size = wave_size.max(1);
    while !pending.is_empty() {
        guard.check()?;
        let take = pending.len().min(wave_size);
        let wave: Vec<Oid> = pending.drain(..take).collect();
        let results = join_all(wave.iter().map(|oid| source.get_object(root, *oid))).await;
        guard.check()?;
        for (oid, result) in wave.into_iter().zip(results) {
            match result {
                Ok(raw) => match commits.decode_and_insert(oid, &raw) {
                    Ok(commit) => {
                        for parent in &commit.parents {
                            if !commits.has(parent) && attempted.insert(*parent) {
                                pending.push(*parent);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(oid = %oid.short(), error = %err, "malformed object; using minimal vertex");
                        fetched.malformed.push(oid);
                    }
                },
                Err(err) => {
                    warn!(oid = %oid.short(), error = %err, "unresolved object; treating as terminal");
                    fetched.unresolved.push(oid);
                }
            }
        }
    }
    Ok(fetched)
}
