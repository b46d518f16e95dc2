// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Message shown on staged-changes placeholders unless configured otherwise.
pub const DEFAULT_STAGED_MESSAGE: &str = "staged changes";

/// Tunables for the recomputation engine.
///
/// Every field has a default, so partial config blobs deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Build a [`CompactView`](crate::CompactView) on every cycle.
    pub compact_view: bool,
    /// Message carried by staged-changes placeholders.
    pub staged_message: String,
    /// Maximum objects requested concurrently per fetch wave.
    pub fetch_concurrency: usize,
    /// Resolve upstream remotes for newly seen local branches.
    pub resolve_upstreams: bool,
    /// Advisory byte budget for the shared commit store.
    pub commit_store_budget_bytes: Option<usize>,
    /// Run the graph consistency check in release builds as well.
    pub verify_consistency: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compact_view: false,
            staged_message: DEFAULT_STAGED_MESSAGE.to_owned(),
            fetch_concurrency: 32,
            resolve_upstreams: true,
            commit_store_budget_bytes: None,
            verify_consistency: false,
        }
    }
}
