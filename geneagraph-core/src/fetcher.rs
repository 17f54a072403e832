//! HTTP fetching and the cache-aware record adapter.

use crate::cache::{Cache, CacheStatus};
use crate::error::TraverseResult;
use crate::parser::parse_record;
use crate::record::{Record, RecordId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Base URL of the genealogy site.
pub const GENEALOGY_URL: &str = "https://www.mathgenealogy.org";

/// Source of raw records, keyed by id.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetch and parse one record. `None` means the id does not exist
    /// on the remote site; errors abort the whole traversal.
    async fn fetch(&self, id: RecordId) -> TraverseResult<Option<Record>>;
}

/// Production fetcher for the genealogy web site.
///
/// All requests go through one shared [`reqwest::Client`]. The
/// optional gate bounds the number of in-flight requests; it is held
/// for the network round-trip only, never across parsing.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    gate: Option<Arc<Semaphore>>,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            client,
            base_url: GENEALOGY_URL.to_string(),
            gate,
        }
    }

    /// Point the fetcher at a different host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl RecordFetcher for HttpFetcher {
    async fn fetch(&self, id: RecordId) -> TraverseResult<Option<Record>> {
        let url = format!("{}/id.php?id={}", self.base_url, id);
        let body = {
            // The gate is never closed, so acquisition cannot fail.
            let _permit = match &self.gate {
                Some(gate) => gate.acquire().await.ok(),
                None => None,
            };
            debug!(%id, %url, "fetching record page");
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.text().await?
        };
        Ok(parse_record(id, &body))
    }
}

/// Cache-aware record lookup.
///
/// The cache is consulted first: a hit short-circuits the fetch, and
/// a stored `None` means the id is known not to exist, so no request
/// is made at all. On a miss the fetched result, `None` included, is
/// written back before returning.
pub async fn get_record(
    id: RecordId,
    fetcher: &dyn RecordFetcher,
    cache: Option<&dyn Cache>,
) -> TraverseResult<Option<Record>> {
    if let Some(cache) = cache {
        if let (CacheStatus::Hit, value) = cache.get(id).await? {
            debug!(%id, found = value.is_some(), "record cache hit");
            return Ok(value);
        }
    }

    let record = fetcher.fetch(id).await?;

    if let Some(cache) = cache {
        cache.set(id, record.as_ref()).await?;
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        value: Option<Record>,
    }

    #[async_trait]
    impl RecordFetcher for CountingFetcher {
        async fn fetch(&self, _id: RecordId) -> TraverseResult<Option<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    fn record(id: u32) -> Record {
        Record {
            id: RecordId(id),
            name: format!("Mathematician {id}"),
            institution: None,
            year: None,
            descendants: Vec::new(),
            advisors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_miss_fetches_and_writes_back() {
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
            value: Some(record(3)),
        };
        let cache = MemoryCache::new();

        let first = get_record(RecordId(3), &fetcher, Some(&cache)).await.unwrap();
        assert_eq!(first, Some(record(3)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        // Second lookup is served from the cache.
        let second = get_record(RecordId(3), &fetcher, Some(&cache)).await.unwrap();
        assert_eq!(second, Some(record(3)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_negative_result_skips_fetch() {
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
            value: Some(record(9)),
        };
        let cache = MemoryCache::new();
        cache.set(RecordId(9), None).await.unwrap();

        let result = get_record(RecordId(9), &fetcher, Some(&cache)).await.unwrap();
        assert_eq!(result, None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negative_fetch_is_cached() {
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
            value: None,
        };
        let cache = MemoryCache::new();

        assert_eq!(get_record(RecordId(5), &fetcher, Some(&cache)).await.unwrap(), None);
        assert_eq!(get_record(RecordId(5), &fetcher, Some(&cache)).await.unwrap(), None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_cache_always_fetches() {
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
            value: None,
        };
        assert_eq!(get_record(RecordId(5), &fetcher, None).await.unwrap(), None);
        assert_eq!(get_record(RecordId(5), &fetcher, None).await.unwrap(), None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
