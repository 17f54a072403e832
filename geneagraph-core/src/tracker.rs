//! Lifecycle bookkeeping for the traversal.
//!
//! Every id moves through exactly one path: unseen → `todo` → `doing`
//! → `done`. The three sets stay pairwise disjoint and an id never
//! re-enters an earlier state, which is what makes neighbor discovery
//! idempotent and guarantees each record is fetched at most once.

use crate::callbacks::ProgressObserver;
use crate::concurrency::{Event, TaskScope};
use crate::record::{RecordId, TraverseDirection, TraverseItem};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How many fetches may be speculatively in flight beyond the record
/// cap before admission stalls. Keeps the pipeline full near the cap
/// without wasting much work once it is tight.
pub const MAX_RECORDS_OVERSHOOT: usize = 10;

/// Raised by the admission gate once received records have already met
/// the cap. Internal to the traversal loop, which answers it by
/// purging queued work; callers of `build_graph` never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapReached;

struct TrackerInner {
    todo: HashMap<RecordId, TraverseItem>,
    doing: HashMap<RecordId, TraverseItem>,
    done: HashSet<RecordId>,
    /// Fetches that returned an actual record.
    received: usize,
}

impl TrackerInner {
    fn seen(&self, id: RecordId) -> bool {
        self.todo.contains_key(&id) || self.doing.contains_key(&id) || self.done.contains(&id)
    }
}

/// Tracks every id the traversal has seen through its lifecycle and
/// gates admission of new fetches against the record cap.
///
/// All mutations are serialized behind one mutex; the registered
/// progress observer is awaited inside the critical section, so
/// observed counts are consistent and monotone.
pub struct LifecycleTracker {
    inner: Mutex<TrackerInner>,
    max_records: Option<usize>,
    wakeup: Event,
    slot_free: Event,
    report: Option<Arc<dyn ProgressObserver>>,
    scope: TaskScope,
}

impl LifecycleTracker {
    /// Seed the tracker. Duplicate seed ids keep the first occurrence.
    pub fn new(
        seeds: &[TraverseItem],
        max_records: Option<usize>,
        report: Option<Arc<dyn ProgressObserver>>,
        scope: TaskScope,
    ) -> Self {
        let mut todo = HashMap::new();
        for item in seeds {
            todo.entry(item.id).or_insert(*item);
        }
        Self {
            inner: Mutex::new(TrackerInner {
                todo,
                doing: HashMap::new(),
                done: HashSet::new(),
                received: 0,
            }),
            max_records,
            wakeup: Event::new(),
            slot_free: Event::new(),
            report,
            scope,
        }
    }

    /// Enqueue a newly discovered id under the direction it was found
    /// in. Returns whether it was actually new; ids already seen in
    /// any state are left untouched.
    pub async fn create(&self, id: RecordId, direction: TraverseDirection) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.seen(id) {
            return false;
        }
        inner.todo.insert(id, TraverseItem { id, direction });
        self.report(&inner).await;
        true
    }

    /// Move some entry from `todo` to `doing` and return it. The pick
    /// order is unspecified and nothing may depend on it.
    pub async fn start_next(&self) -> Option<TraverseItem> {
        let mut inner = self.inner.lock().await;
        let id = *inner.todo.keys().next()?;
        let item = inner.todo.remove(&id)?;
        inner.doing.insert(id, item);
        self.report(&inner).await;
        Some(item)
    }

    /// Move an in-flight id to `done`, count the record if one came
    /// back, and free an admission slot.
    pub async fn finish(&self, id: RecordId, got_record: bool) {
        let mut inner = self.inner.lock().await;
        if inner.doing.remove(&id).is_some() {
            inner.done.insert(id);
            if got_record {
                inner.received += 1;
            }
        }
        self.slot_free.set();
        self.report(&inner).await;
    }

    /// Drop all queued work. Used once the cap stops admission.
    pub async fn purge_todo(&self) {
        let mut inner = self.inner.lock().await;
        inner.todo.clear();
        self.report(&inner).await;
    }

    /// Admission gate for the scheduling loop.
    ///
    /// Blocks while enough fetches are in flight to fill the cap plus
    /// the overshoot allowance. While blocked, fails with
    /// [`CapReached`] as soon as received records alone meet the cap;
    /// nothing else that could be fetched would fit the graph.
    pub async fn process_another(&self) -> Result<(), CapReached> {
        let Some(max_records) = self.max_records else {
            return Ok(());
        };
        loop {
            self.slot_free.clear();
            {
                let inner = self.inner.lock().await;
                let potential = inner.doing.len() + inner.received;
                if potential < max_records + MAX_RECORDS_OVERSHOOT {
                    return Ok(());
                }
                if inner.received >= max_records {
                    return Err(CapReached);
                }
            }
            // Re-armed above; finish() signals it on every completion.
            self.slot_free.wait().await;
        }
    }

    /// Whether every enqueued id has been fully processed.
    pub async fn all_done(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.todo.is_empty() && inner.doing.is_empty()
    }

    pub async fn todo_len(&self) -> usize {
        self.inner.lock().await.todo.len()
    }

    /// Sizes of the three lifecycle sets, in `(todo, doing, done)`
    /// order.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let inner = self.inner.lock().await;
        (inner.todo.len(), inner.doing.len(), inner.done.len())
    }

    /// Number of fetches so far that produced a record.
    pub async fn received(&self) -> usize {
        self.inner.lock().await.received
    }

    /// Wake the scheduling loop.
    pub fn wake(&self) {
        self.wakeup.set();
    }

    /// Re-arm the wakeup signal before checking for new work.
    pub fn clear_wakeup(&self) {
        self.wakeup.clear();
    }

    /// Park until a running task signals new work or completion.
    pub async fn wait_wakeup(&self) {
        self.wakeup.wait().await;
    }

    async fn report(&self, inner: &TrackerInner) {
        if let Some(report) = &self.report {
            report
                .on_progress(
                    &self.scope,
                    inner.todo.len(),
                    inner.doing.len(),
                    inner.done.len(),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::ProgressObserver;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    fn item(id: u32) -> TraverseItem {
        TraverseItem {
            id: RecordId(id),
            direction: TraverseDirection::ADVISORS,
        }
    }

    fn tracker(seeds: &[TraverseItem], max_records: Option<usize>) -> LifecycleTracker {
        LifecycleTracker::new(seeds, max_records, None, TaskScope::new())
    }

    #[derive(Default)]
    struct Recording {
        snapshots: parking_lot::Mutex<Vec<(usize, usize, usize)>>,
    }

    #[async_trait]
    impl ProgressObserver for Recording {
        async fn on_progress(&self, _scope: &TaskScope, todo: usize, doing: usize, done: usize) {
            self.snapshots.lock().push((todo, doing, done));
        }
    }

    #[tokio::test]
    async fn test_seeds_deduplicate_keeping_first() {
        let t = tracker(
            &[
                item(1),
                TraverseItem {
                    id: RecordId(1),
                    direction: TraverseDirection::DESCENDANTS,
                },
                item(2),
            ],
            None,
        );
        assert_eq!(t.todo_len().await, 2);
        // Whatever comes out for id 1 must carry the first direction.
        let mut seen = Vec::new();
        while let Some(next) = t.start_next().await {
            seen.push(next);
        }
        let first = seen.iter().find(|i| i.id == RecordId(1)).unwrap();
        assert_eq!(first.direction, TraverseDirection::ADVISORS);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let t = tracker(&[item(1)], None);
        assert!(!t.create(RecordId(1), TraverseDirection::DESCENDANTS).await);
        assert!(t.create(RecordId(3), TraverseDirection::ADVISORS).await);
        assert!(!t.create(RecordId(3), TraverseDirection::ADVISORS).await);
        assert_eq!(t.todo_len().await, 2);
    }

    #[tokio::test]
    async fn test_id_never_reenters_after_done() {
        let t = tracker(&[item(1)], None);
        let next = t.start_next().await.unwrap();
        t.finish(next.id, true).await;
        assert!(!t.create(next.id, TraverseDirection::ADVISORS).await);
        assert_eq!(t.counts().await, (0, 0, 1));
    }

    #[tokio::test]
    async fn test_start_next_moves_to_doing() {
        let t = tracker(&[item(1), item(2)], None);
        let next = t.start_next().await.unwrap();
        assert!(next.id == RecordId(1) || next.id == RecordId(2));
        assert_eq!(t.counts().await, (1, 1, 0));
    }

    #[tokio::test]
    async fn test_finish_counts_received_records_only() {
        let t = tracker(&[item(1), item(2)], None);
        let a = t.start_next().await.unwrap();
        let b = t.start_next().await.unwrap();
        t.finish(a.id, true).await;
        t.finish(b.id, false).await;
        assert_eq!(t.received().await, 1);
        assert_eq!(t.counts().await, (0, 0, 2));
        assert!(t.all_done().await);
    }

    #[tokio::test]
    async fn test_purge_todo_empties_queue() {
        let t = tracker(&[item(1), item(2), item(3)], None);
        t.purge_todo().await;
        assert_eq!(t.todo_len().await, 0);
    }

    #[tokio::test]
    async fn test_admission_unbounded_without_cap() {
        let t = tracker(&[item(1)], None);
        assert!(t.process_another().await.is_ok());
    }

    #[tokio::test]
    async fn test_admission_open_below_overshoot_allowance() {
        let t = tracker(&[item(1), item(2)], Some(1));
        let next = t.start_next().await.unwrap();
        t.finish(next.id, true).await;
        // received == cap, but potential (1) is below cap + overshoot,
        // so speculative fetches are still admitted.
        assert!(t.process_another().await.is_ok());
    }

    #[tokio::test]
    async fn test_admission_fails_when_cap_met_while_saturated() {
        let seeds: Vec<_> = (1..=20).map(item).collect();
        let t = tracker(&seeds, Some(2));
        let mut started = Vec::new();
        for _ in 0..14 {
            started.push(t.start_next().await.unwrap());
        }
        t.finish(started[0].id, true).await;
        t.finish(started[1].id, true).await;
        // potential = 12 doing + 2 received >= 2 + 10, and received
        // already meets the cap.
        assert_eq!(t.process_another().await, Err(CapReached));
    }

    #[tokio::test]
    async fn test_admission_blocks_until_slot_frees() {
        let seeds: Vec<_> = (1..=20).map(item).collect();
        let t = Arc::new(tracker(&seeds, Some(2)));
        let mut started = Vec::new();
        for _ in 0..12 {
            started.push(t.start_next().await.unwrap());
        }
        // potential = 12 >= 12: blocked, but the cap is not met yet.
        let gate = {
            let t = Arc::clone(&t);
            tokio::spawn(async move { t.process_another().await })
        };
        tokio::task::yield_now().await;
        assert!(!gate.is_finished());

        t.finish(started[0].id, false).await;
        let result = timeout(Duration::from_secs(1), gate)
            .await
            .expect("gate should unblock")
            .unwrap();
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_every_mutation_emits_progress() {
        let recording = Arc::new(Recording::default());
        let t = LifecycleTracker::new(
            &[item(1)],
            None,
            Some(Arc::clone(&recording) as Arc<dyn ProgressObserver>),
            TaskScope::new(),
        );

        let next = t.start_next().await.unwrap();
        t.create(RecordId(2), TraverseDirection::ADVISORS).await;
        t.finish(next.id, true).await;
        t.purge_todo().await;

        let snapshots = recording.snapshots.lock().clone();
        assert_eq!(
            snapshots,
            vec![(0, 1, 0), (1, 1, 0), (1, 0, 1), (0, 0, 1)]
        );
    }

    #[tokio::test]
    async fn test_wakeup_is_rearmable() {
        let t = tracker(&[item(1)], None);
        t.wake();
        timeout(Duration::from_secs(1), t.wait_wakeup())
            .await
            .expect("latched wakeup should not block");
        t.clear_wakeup();
        let blocked = timeout(Duration::from_millis(50), t.wait_wakeup()).await;
        assert!(blocked.is_err());
    }
}
