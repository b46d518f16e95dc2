// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Lineage crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`branches`] - [`BranchBuilder`] for branch snapshot records
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`objects`] - [`CommitObjectBuilder`] for raw commit payloads
//! - [`oids`] - Label-derived oid helpers
//! - [`repository`] - [`FakeRepository`], an in-memory `RepositorySource`
//! - [`tracing`](mod@crate::tracing) - Subscriber setup for test output

pub mod branches;
pub mod config;
pub mod objects;
pub mod oids;
pub mod repository;
pub mod tracing;

pub use branches::BranchBuilder;
pub use config::InMemoryConfigStore;
pub use objects::CommitObjectBuilder;
pub use oids::{make_oid, make_oid_from_seed};
pub use repository::FakeRepository;
pub use crate::tracing::init_test_tracing;
