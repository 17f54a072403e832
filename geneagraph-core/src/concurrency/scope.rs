//! Structured task scope owning the traversal's fetch tasks.

use crate::error::{TraverseError, TraverseResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Clonable handle to a group of spawned tasks.
///
/// Every task spawned through any clone of the handle is joined by
/// `wait_all`, including tasks spawned from callbacks while the join
/// is already draining. The first task error aborts the remainder and
/// becomes the scope's result.
#[derive(Clone, Default)]
pub struct TaskScope {
    tasks: Arc<Mutex<Vec<JoinHandle<TraverseResult<()>>>>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task owned by this scope.
    pub async fn spawn<F>(&self, future: F)
    where
        F: Future<Output = TraverseResult<()>> + Send + 'static,
    {
        self.tasks.lock().await.push(tokio::spawn(future));
    }

    /// Number of tasks spawned and not yet drained by `wait_all`.
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Join every task in the scope, then every task they spawned,
    /// until the scope is quiescent. On the first error the remaining
    /// tasks are aborted and the error is returned.
    pub async fn wait_all(&self) -> TraverseResult<()> {
        let mut first_error: Option<TraverseError> = None;
        loop {
            let mut handles = std::mem::take(&mut *self.tasks.lock().await);
            if handles.is_empty() {
                break;
            }
            if first_error.is_some() {
                for handle in &handles {
                    handle.abort();
                }
            }
            while !handles.is_empty() {
                let (result, _index, remaining) = futures::future::select_all(handles).await;
                handles = remaining;
                let err = match result {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => err,
                    Err(join_err) if join_err.is_cancelled() => continue,
                    Err(join_err) => TraverseError::TaskJoin(join_err.to_string()),
                };
                if first_error.is_none() {
                    first_error = Some(err);
                    for handle in &handles {
                        handle.abort();
                    }
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_all_joins_everything() {
        let scope = TaskScope::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            scope
                .spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
        }

        assert_eq!(scope.task_count().await, 4);
        scope.wait_all().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(scope.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_tasks_spawned_while_draining_are_joined() {
        let scope = TaskScope::new();
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let scope_handle = scope.clone();
            let counter = Arc::clone(&counter);
            scope
                .spawn(async move {
                    let counter = Arc::clone(&counter);
                    scope_handle
                        .spawn(async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .await;
                    Ok(())
                })
                .await;
        }

        scope.wait_all().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_error_aborts_siblings() {
        let scope = TaskScope::new();

        scope
            .spawn(async { Err(TraverseError::Fetch("boom".into())) })
            .await;
        scope
            .spawn(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        let result = tokio::time::timeout(Duration::from_secs(5), scope.wait_all()).await;
        let err = result.expect("sleeper must be aborted").unwrap_err();
        assert!(matches!(err, TraverseError::Fetch(_)));
    }
}
