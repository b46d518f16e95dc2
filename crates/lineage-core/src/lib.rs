// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Incremental commit-graph engine.
//!
//! `lineage-core` maintains an in-memory DAG of a repository's history across
//! all of its branches and keeps it consistent as branch snapshots change:
//! new commits, checkouts, staged edits, merge conflicts, deleted branches.
//!
//! # Pipeline
//!
//! Each recomputation cycle runs, in order: change detection against the
//! previous snapshot ([`detect_changes`]), object fetch and decode
//! ([`decode_commit`], cached in [`CommitStore`]), vertex removal and upsert
//! ([`Graph::remove_vertex`], [`Graph::upsert_vertex`]), placeholder
//! synthesis ([`Graph::synthesize_placeholders`]), a single [`Graph::link`]
//! pass, and [`topological_order`]. [`Engine`] drives the cycle and discards
//! results superseded by a newer snapshot.
//!
//! # Determinism Invariant
//!
//! Vertices, parents, and children live in ordered collections. Given the
//! same branch snapshots and objects, the graph, its topological order, and
//! its [`Graph::digest`] are identical across runs and platforms.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod branch;
mod commit;
mod config;
mod decode;
mod diff;
mod engine;
mod graph;
mod ident;
mod label;
mod placeholder;
mod source;
mod store;
mod topo;
mod vertex;

pub use branch::{compare_branch, Branch, BranchLookup, BranchStatus};
pub use commit::{Commit, Signature};
pub use config::{EngineConfig, DEFAULT_STAGED_MESSAGE};
pub use decode::{decode_commit, DecodeError};
pub use diff::{detect_changes, diff_commits, BranchChange, BranchDelta, TrackedField};
pub use engine::{
    CycleError, CycleOutcome, CycleOutput, CycleSummary, Engine, EngineError, Recomputation,
    RepoView,
};
pub use graph::{Graph, GraphError, Hash32};
pub use ident::{BranchId, Oid, OidError, RepoId, Scope, VertexKey, OID_LEN};
pub use label::{classify, CompactNode, CompactView, Label, Labels};
pub use placeholder::{conflict_key, staged_key, PlaceholderChanges};
pub use source::{RepositorySource, SourceError};
pub use store::CommitStore;
pub use topo::topological_order;
pub use vertex::{Vertex, VertexColor};
