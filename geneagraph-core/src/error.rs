//! Error types for the traversal engine and its collaborators.

use crate::record::RecordId;
use thiserror::Error;

/// Result type for traversal operations.
pub type TraverseResult<T> = Result<T, TraverseError>;

/// Errors surfaced to callers of the traversal engine.
///
/// A record that turns out not to exist is not an error; fetchers
/// report it as `None` and the engine simply leaves it out of the
/// graph.
#[derive(Error, Debug)]
pub enum TraverseError {
    /// HTTP request failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Fetcher failure outside the HTTP layer
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Cache backend failure
    #[error("cache error: {0}")]
    Cache(String),

    /// A traverse item was built with no directions to expand
    #[error("traverse item for record {0} has an empty direction")]
    EmptyDirection(RecordId),

    /// A spawned fetch task could not be joined
    #[error("task join error: {0}")]
    TaskJoin(String),
}
