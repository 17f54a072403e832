//! Observer hooks invoked during traversal.
//!
//! Both observers receive the traversal's [`TaskScope`], so they can
//! spawn follow-up work that the engine will await before returning
//! the finished graph.

use crate::concurrency::TaskScope;
use crate::record::Record;
use async_trait::async_trait;

/// Receives every record committed to the graph.
#[async_trait]
pub trait RecordObserver: Send + Sync {
    /// Called after `record` has been inserted into the graph, before
    /// any of its neighbors can be committed through it.
    async fn on_record(&self, scope: &TaskScope, record: &Record);
}

/// Receives lifecycle counts after every tracker mutation.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    /// `todo`, `doing` and `done` are the sizes of the tracker's three
    /// id sets immediately after the mutation that triggered the call.
    async fn on_progress(&self, scope: &TaskScope, todo: usize, doing: usize, done: usize);
}
