//! Stderr progress bar fed by the traversal's report callback.

use async_trait::async_trait;
use geneagraph_core::{ProgressObserver, TaskScope};
use std::io::Write;

const BAR_WIDTH: usize = 60;

/// Renders `done` over the total known workload as a fixed-width bar.
/// In-flight fetches show as `:`; queued work as `.`.
#[derive(Default)]
pub struct ProgressBar;

impl ProgressBar {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressObserver for ProgressBar {
    async fn on_progress(&self, _scope: &TaskScope, todo: usize, doing: usize, done: usize) {
        let total = todo + doing + done;
        if total == 0 {
            return;
        }
        let filled = BAR_WIDTH * done / total;
        let active = BAR_WIDTH * doing / total;
        let queued = BAR_WIDTH - filled - active;
        eprint!(
            "\rProgress: [{}{}{}] {}/{}",
            "█".repeat(filled),
            ":".repeat(active),
            ".".repeat(queued),
            done,
            total
        );
        let _ = std::io::stderr().flush();
    }
}
