// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port to the command layer that talks to the version-control tool.

use std::future::Future;
use std::path::Path;

use thiserror::Error;

use crate::branch::Branch;
use crate::ident::Oid;

/// Error type for repository source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested object or ref does not exist (e.g. shallow history).
    #[error("not found: {0}")]
    NotFound(String),
    /// I/O error while talking to the tool.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Async data source for branch listings and raw objects.
///
/// Implementations are external collaborators: the engine only reads through
/// this port and never mutates the repository.
pub trait RepositorySource {
    /// Enumerate local and remote branches with their ordered commit lists.
    fn list_branches(
        &self,
        root: &Path,
    ) -> impl Future<Output = Result<Vec<Branch>, SourceError>> + Send;

    /// Fetch the raw, decompressed object payload for `oid`.
    fn get_object(
        &self,
        root: &Path,
        oid: Oid,
    ) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;

    /// Name of the remote a local branch tracks, if any.
    fn get_upstream_remote(
        &self,
        root: &Path,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, SourceError>> + Send;
}
