//! Worker pool draining the shared work queue.
//!
//! Spawns N persistent tokio tasks that pull items from the priority
//! queue. Results are sent to an unbounded channel for consumption by
//! the orchestrator's drive loop. Workers exit when the queue is closed
//! and drained, which closes the result channel in turn.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::queue::{WorkItem, WorkQueue};

/// Hard safety-net timeout per work item. A worker whose item hangs
/// beyond every application-level timeout drops the future and moves on,
/// so the pool never deadlocks. Set well above the HTTP timeout plus
/// media downloads.
const SAFETY_TIMEOUT: Duration = Duration::from_secs(300);

/// A pool of worker tasks processing queue items concurrently.
pub struct WorkerPool<R: Send + 'static> {
    result_rx: mpsc::UnboundedReceiver<R>,
    _handles: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Spawn `n` workers over `queue`. Each worker repeatedly pops an
    /// item and runs `process_fn`; results are available via
    /// [`recv()`](Self::recv).
    pub fn start<F, Fut>(n: usize, queue: Arc<WorkQueue>, process_fn: F) -> Self
    where
        F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::unbounded_channel::<R>();
        let process_fn = Arc::new(process_fn);

        let handles: Vec<JoinHandle<()>> = (0..n.max(1))
            .map(|_| {
                let queue = queue.clone();
                let result_tx = result_tx.clone();
                let process_fn = process_fn.clone();
                tokio::spawn(async move {
                    while let Some(item) = queue.pop().await {
                        match tokio::time::timeout(SAFETY_TIMEOUT, process_fn(item)).await {
                            Ok(result) => {
                                if result_tx.send(result).is_err() {
                                    break; // Receiver dropped
                                }
                            }
                            Err(_) => {
                                log::debug!(
                                    "Worker pool: item timed out after {}s, skipping",
                                    SAFETY_TIMEOUT.as_secs()
                                );
                            }
                        }
                    }
                })
            })
            .collect();

        // Drop our copy so the channel closes when all workers finish.
        drop(result_tx);

        Self {
            result_rx,
            _handles: handles,
        }
    }

    /// Receive the next result; `None` once every worker has exited.
    pub async fn recv(&mut self) -> Option<R> {
        self.result_rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Action;
    use crate::queue::Priority;

    fn item(rom_index: usize) -> WorkItem {
        WorkItem {
            rom_index,
            action: Action::FullScrape,
            media_needed: vec![],
            retry_count: 0,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn all_items_processed_across_workers() {
        let queue = Arc::new(WorkQueue::new(3));
        for i in 0..20 {
            queue.push(item(i), Priority::Normal);
        }
        queue.close();

        let mut pool = WorkerPool::start(4, queue, |item| async move { item.rom_index });
        let mut seen = Vec::new();
        while let Some(index) = pool.recv().await {
            seen.push(index);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_closed_queue_finishes_immediately() {
        let queue = Arc::new(WorkQueue::new(3));
        queue.close();
        let mut pool = WorkerPool::start(2, queue, |item| async move { item.rom_index });
        assert!(pool.recv().await.is_none());
    }
}
