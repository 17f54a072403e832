//! Concurrent crawler for the Mathematics Genealogy Project.
//!
//! Starting from a set of seed record ids and a traversal direction
//! per seed (advisors, descendants, or both), the crate fetches pages
//! from the genealogy site, parses each into a [`Record`], follows
//! the requested neighbor links, and assembles everything reachable
//! into one [`Geneagraph`] keyed by record id.
//!
//! Fetches run concurrently under an optional in-flight request gate,
//! results can be memoized through a pluggable [`Cache`] (negative
//! results included), and callers can watch the crawl through record
//! and progress observers. An optional record cap bounds the output
//! graph with a small, bounded amount of speculative over-fetching.

pub mod cache;
pub mod callbacks;
pub mod concurrency;
pub mod error;
pub mod fetcher;
pub mod parser;
pub mod record;
pub mod tracker;
pub mod traverse;

pub use cache::{Cache, CacheStatus, MemoryCache};
pub use callbacks::{ProgressObserver, RecordObserver};
pub use concurrency::{Event, TaskScope};
pub use error::{TraverseError, TraverseResult};
pub use fetcher::{get_record, HttpFetcher, RecordFetcher, GENEALOGY_URL};
pub use parser::parse_record;
pub use record::{Record, RecordId, TraverseDirection, TraverseItem};
pub use tracker::{CapReached, LifecycleTracker, MAX_RECORDS_OVERSHOOT};
pub use traverse::{build_graph, build_graph_with, BuildOptions, Geneagraph, GraphStatus};
