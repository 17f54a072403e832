//! The concurrent traversal engine.
//!
//! `build_graph` drives a scheduling loop over a shared
//! [`LifecycleTracker`]: admitted items are taken off the todo queue
//! and fetched concurrently; each completed fetch commits its record,
//! notifies the record observer, and enqueues the neighbors matching
//! the item's direction. A re-armable wakeup signal parks the loop
//! whenever the queue runs dry while fetches are still in flight.

use crate::cache::Cache;
use crate::callbacks::{ProgressObserver, RecordObserver};
use crate::concurrency::TaskScope;
use crate::error::TraverseResult;
use crate::fetcher::{get_record, HttpFetcher, RecordFetcher};
use crate::record::{Record, RecordId, TraverseDirection, TraverseItem};
use crate::tracker::LifecycleTracker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// Completion status of a built graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphStatus {
    /// Every enqueued id was fetched and every record fit the cap.
    Complete,
    /// A fetched record was discarded by the record cap, or the cap
    /// stopped admission with work still queued.
    Truncated,
}

/// The assembled genealogy graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geneagraph {
    pub start_nodes: Vec<RecordId>,
    pub nodes: HashMap<RecordId, Record>,
    pub status: GraphStatus,
}

/// Traversal options. All of them are optional; `Default` gives an
/// uncapped, uncached, ungated crawl.
#[derive(Clone, Default)]
pub struct BuildOptions {
    max_records: Option<usize>,
    http_gate: Option<Arc<Semaphore>>,
    user_agent: Option<String>,
    cache: Option<Arc<dyn Cache>>,
    record_observer: Option<Arc<dyn RecordObserver>>,
    progress_observer: Option<Arc<dyn ProgressObserver>>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of records committed to the graph.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// Bound in-flight HTTP requests with a shared semaphore.
    pub fn with_http_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.http_gate = Some(gate);
        self
    }

    /// Send a custom `User-Agent` header with every request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Consult and fill a record cache around every fetch.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Observe every record committed to the graph.
    pub fn with_record_observer(mut self, observer: Arc<dyn RecordObserver>) -> Self {
        self.record_observer = Some(observer);
        self
    }

    /// Observe lifecycle counts after every tracker mutation.
    pub fn with_progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress_observer = Some(observer);
        self
    }
}

#[derive(Clone)]
struct GraphInner {
    nodes: HashMap<RecordId, Record>,
    status: GraphStatus,
}

/// Crawl the genealogy site starting from `seeds` and assemble the
/// reachable records into one graph.
///
/// One HTTP session is opened for the whole run and shared by every
/// fetch task. The call returns once all spawned work has completed;
/// on error the first failure is returned and no partial graph
/// survives.
pub async fn build_graph(
    seeds: &[TraverseItem],
    options: BuildOptions,
) -> TraverseResult<Geneagraph> {
    let mut builder = reqwest::Client::builder();
    if let Some(user_agent) = &options.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    let client = builder.build()?;
    let fetcher = Arc::new(HttpFetcher::new(client, options.http_gate.clone()));
    build_graph_with(fetcher, seeds, options).await
}

/// Crawl using a caller-supplied fetcher. Entry point for tests and
/// for alternative record sources.
pub async fn build_graph_with(
    fetcher: Arc<dyn RecordFetcher>,
    seeds: &[TraverseItem],
    options: BuildOptions,
) -> TraverseResult<Geneagraph> {
    let scope = TaskScope::new();
    let tracker = Arc::new(LifecycleTracker::new(
        seeds,
        options.max_records,
        options.progress_observer.clone(),
        scope.clone(),
    ));

    // Seed ids in first-occurrence order, deduplicated like the
    // tracker deduplicates them.
    let mut start_nodes: Vec<RecordId> = Vec::new();
    for item in seeds {
        if !start_nodes.contains(&item.id) {
            start_nodes.push(item.id);
        }
    }

    let graph = Arc::new(Mutex::new(GraphInner {
        nodes: HashMap::new(),
        status: GraphStatus::Complete,
    }));

    loop {
        if tracker.todo_len().await == 0 {
            break;
        }

        if tracker.process_another().await.is_err() {
            debug!("record cap reached, dropping queued work");
            graph.lock().await.status = GraphStatus::Truncated;
            tracker.purge_todo().await;
            break;
        }

        let Some(item) = tracker.start_next().await else {
            continue;
        };

        let task = fetch_and_process(
            item,
            Arc::clone(&fetcher),
            options.cache.clone(),
            Arc::clone(&tracker),
            Arc::clone(&graph),
            scope.clone(),
            options.record_observer.clone(),
            options.max_records,
        );
        {
            let tracker = Arc::clone(&tracker);
            scope
                .spawn(async move {
                    let result = task.await;
                    if result.is_err() {
                        // Keep the books consistent so in-flight
                        // siblings can drain, then force the
                        // scheduling loop awake; the error itself
                        // surfaces through the scope join.
                        tracker.finish(item.id, false).await;
                        tracker.purge_todo().await;
                        tracker.wake();
                    }
                    result
                })
                .await;
        }

        // Park until a task either enqueues new work or reports that
        // everything has drained. Re-arm first: a wakeup raised after
        // this point must not be lost, and the re-check below covers
        // one raised before it.
        tracker.clear_wakeup();
        if tracker.todo_len().await == 0 && !tracker.all_done().await {
            tracker.wait_wakeup().await;
        }
    }

    scope.wait_all().await?;

    let inner = match Arc::try_unwrap(graph) {
        Ok(mutex) => mutex.into_inner(),
        Err(shared) => shared.lock().await.clone(),
    };

    Ok(Geneagraph {
        start_nodes,
        nodes: inner.nodes,
        status: inner.status,
    })
}

/// One unit of traversal work: fetch a record, account for it, and
/// fan out to its neighbors.
#[allow(clippy::too_many_arguments)]
async fn fetch_and_process(
    item: TraverseItem,
    fetcher: Arc<dyn RecordFetcher>,
    cache: Option<Arc<dyn Cache>>,
    tracker: Arc<LifecycleTracker>,
    graph: Arc<Mutex<GraphInner>>,
    scope: TaskScope,
    record_observer: Option<Arc<dyn RecordObserver>>,
    max_records: Option<usize>,
) -> TraverseResult<()> {
    let record = get_record(item.id, fetcher.as_ref(), cache.as_deref()).await?;
    tracker.finish(item.id, record.is_some()).await;

    if let Some(record) = record {
        // The cap check and the insert form one critical section, so
        // concurrent committers cannot overshoot the cap.
        let committed = {
            let mut graph = graph.lock().await;
            if max_records.map_or(true, |max| graph.nodes.len() < max) {
                graph.nodes.insert(item.id, record.clone());
                true
            } else {
                graph.status = GraphStatus::Truncated;
                false
            }
        };

        if committed {
            if let Some(observer) = &record_observer {
                observer.on_record(&scope, &record).await;
            }
            expand_neighbors(&tracker, &item, &record).await;
        } else {
            warn!(id = %item.id, "record cap filled, discarding fetched record");
        }
    }

    if tracker.all_done().await {
        tracker.wake();
    }
    Ok(())
}

/// Enqueue the record's neighbors for every direction bit the item
/// carries. Discovered ids inherit only the direction they were found
/// under.
async fn expand_neighbors(tracker: &LifecycleTracker, item: &TraverseItem, record: &Record) {
    for direction in [TraverseDirection::ADVISORS, TraverseDirection::DESCENDANTS] {
        if !item.direction.contains(direction) {
            continue;
        }
        let neighbors = if direction == TraverseDirection::ADVISORS {
            &record.advisors
        } else {
            &record.descendants
        };
        for &neighbor in neighbors {
            if tracker.create(neighbor, direction).await {
                tracker.wake();
            }
        }
    }
}
