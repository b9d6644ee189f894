//! Prioritized work queue.
//!
//! A single shared queue ordered by priority (higher drains first), FIFO
//! within a priority level via a monotonic sequence number. Retryable
//! failures re-enqueue at HIGH priority until the retry budget is spent,
//! then land on the failed list exactly once. Not-found items are
//! recorded once and never retried.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use tokio::sync::Notify;

use curateur_scraper::MediaKind;

use crate::evaluator::Action;

/// Work priority; HIGH drains first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Retries and operator-escalated items.
    High,
    /// Fresh items.
    Normal,
    /// Optional/background items (media-only).
    Low,
}

impl Priority {
    fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// One unit of work: a ROM plus its selected action.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Index into the platform's scanned ROM list.
    pub rom_index: usize,
    pub action: Action,
    pub media_needed: Vec<MediaKind>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// A permanently failed item.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub rom_index: usize,
    pub action: Action,
    pub error: String,
    pub retry_count: u32,
}

/// Queue counters for the platform summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub processed: usize,
    pub failed: usize,
    pub not_found: usize,
}

struct Keyed {
    rank: u8,
    seq: u64,
    item: WorkItem,
}

impl PartialEq for Keyed {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}
impl Eq for Keyed {}
impl PartialOrd for Keyed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Keyed {
    // BinaryHeap is a max-heap; invert so the smallest (rank, seq) pops
    // first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.rank, other.seq).cmp(&(self.rank, self.seq))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Keyed>,
    seq: u64,
    complete: bool,
    processed: usize,
    failed: Vec<FailedItem>,
    not_found: Vec<String>,
}

/// Shared priority queue with condition-wait semantics.
pub struct WorkQueue {
    max_retries: u32,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, item: WorkItem, priority: Priority) {
        {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            inner.seq += 1;
            let keyed = Keyed {
                rank: priority.rank(),
                seq: inner.seq,
                item,
            };
            inner.heap.push(keyed);
        }
        self.notify.notify_waiters();
    }

    /// Take the next item, waiting while the queue is empty. Returns
    /// `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<WorkItem> {
        loop {
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                if let Some(keyed) = inner.heap.pop() {
                    return Some(keyed.item);
                }
                if inner.complete {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Handle a retryable failure: re-enqueue at HIGH priority until the
    /// budget is spent, then record on the failed list. Returns whether
    /// the item went back into the queue.
    pub fn retry(&self, mut item: WorkItem, error: &str) -> bool {
        item.retry_count += 1;
        item.last_error = Some(error.to_string());
        if item.retry_count < self.max_retries {
            log::warn!(
                "Retrying item {} (attempt {}/{}): {error}",
                item.rom_index,
                item.retry_count + 1,
                self.max_retries,
            );
            self.push(item, Priority::High);
            true
        } else {
            log::error!(
                "Item {} failed after {} retries: {error}",
                item.rom_index,
                item.retry_count,
            );
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            inner.failed.push(FailedItem {
                rom_index: item.rom_index,
                action: item.action,
                error: error.to_string(),
                retry_count: item.retry_count,
            });
            false
        }
    }

    pub fn mark_processed(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.processed += 1;
    }

    /// Record an entity the Provider does not know. Never re-enqueued.
    pub fn mark_not_found(&self, basename: &str) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.not_found.push(basename.to_string());
    }

    /// Signal that no further work will be added; waiting workers drain
    /// the queue and exit.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            inner.complete = true;
        }
        self.notify.notify_waiters();
    }

    /// Remove all pending items (used on cancellation so they can be
    /// reported rather than processed).
    pub fn drain_pending(&self) -> Vec<WorkItem> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let mut pending: Vec<Keyed> = inner.heap.drain().collect();
        pending.sort_by(|a, b| (a.rank, a.seq).cmp(&(b.rank, b.seq)));
        pending.into_iter().map(|k| k.item).collect()
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().expect("queue lock poisoned");
        QueueStats {
            pending: inner.heap.len(),
            processed: inner.processed,
            failed: inner.failed.len(),
            not_found: inner.not_found.len(),
        }
    }

    pub fn failed_items(&self) -> Vec<FailedItem> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .failed
            .clone()
    }

    pub fn not_found_list(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .not_found
            .clone()
    }
}
