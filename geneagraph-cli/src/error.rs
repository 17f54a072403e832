//! CLI error type.

use geneagraph_core::TraverseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Traverse(#[from] TraverseError),

    #[error("cache database error: {0}")]
    CacheDb(#[from] sled::Error),

    #[error("output serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
