//! Per-service wait queues — FIFO within priority.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use uuid::Uuid;

use super::task::TaskPriority;

/// One queued task id with its ordering keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub task_id: Uuid,
    pub priority: TaskPriority,
    /// Process-wide arrival sequence number, breaks priority ties.
    pub seq: u64,
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: make the most urgent item the greatest.
        // Lower priority rank first, then earlier arrival.
        other
            .priority
            .rank()
            .cmp(&self.priority.rank())
            .then_with(|| other.seq.cmp(&self.seq))
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Wait queues keyed by service name.
///
/// Cancelled ids are not eagerly removed; the dispatch loop skips entries
/// whose task is no longer `queued`.
#[derive(Debug, Default)]
pub struct ServiceQueues {
    queues: HashMap<String, BinaryHeap<QueueItem>>,
    next_seq: u64,
}

impl ServiceQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task id onto its service queue.
    pub fn push(&mut self, service: &str, task_id: Uuid, priority: TaskPriority) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queues
            .entry(service.to_string())
            .or_default()
            .push(QueueItem {
                task_id,
                priority,
                seq,
            });
    }

    /// Pop the highest-priority, earliest-queued item for a service.
    pub fn pop(&mut self, service: &str) -> Option<QueueItem> {
        self.queues.get_mut(service)?.pop()
    }

    /// Push an item back (e.g., no free slot this tick).
    pub fn requeue(&mut self, service: &str, item: QueueItem) {
        self.queues.entry(service.to_string()).or_default().push(item);
    }

    /// Services that currently have queued entries.
    pub fn services_with_waiting(&self) -> Vec<String> {
        self.queues
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self, service: &str) -> usize {
        self.queues.get(service).map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(|q| q.is_empty())
    }
}
