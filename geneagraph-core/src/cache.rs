//! Record cache contract and the in-memory implementation.

use crate::error::TraverseResult;
use crate::record::{Record, RecordId};
use async_trait::async_trait;
use dashmap::DashMap;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The id has been stored. The value may still be `None`: that is
    /// a record previously observed not to exist.
    Hit,
    /// The id has never been stored.
    Miss,
}

/// Store of previously fetched records.
///
/// Implementations must preserve stored `None` values, which mark ids
/// known not to exist so that later runs skip the network round-trip
/// entirely. Backend failures abort the traversal; there is no
/// degraded cache-less fallback.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up the stored value for `id`.
    async fn get(&self, id: RecordId) -> TraverseResult<(CacheStatus, Option<Record>)>;

    /// Store a fetch result for `id`, including negative results.
    async fn set(&self, id: RecordId, value: Option<&Record>) -> TraverseResult<()>;
}

/// In-memory cache backed by a concurrent map. Useful for tests and
/// for memoizing within a single process.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<RecordId, Option<Record>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, negative results included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, id: RecordId) -> TraverseResult<(CacheStatus, Option<Record>)> {
        match self.entries.get(&id) {
            Some(entry) => Ok((CacheStatus::Hit, entry.value().clone())),
            None => Ok((CacheStatus::Miss, None)),
        }
    }

    async fn set(&self, id: RecordId, value: Option<&Record>) -> TraverseResult<()> {
        self.entries.insert(id, value.cloned());
        Ok(())
    }
}
