//! Task scheduler — the execution core.
//!
//! Components:
//! - `task` — priority/status model, `TaskRecord`, cancel token
//! - `queue` — per-service FIFO-within-priority wait queues
//! - `dedupe` — normalized submission fingerprints
//! - `events` — status-transition events, listener + broadcast fan-out
//! - `scheduler` — dispatch loop, concurrency gate, cancel cascade, history sink

pub mod dedupe;
pub mod events;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use events::{EventKind, EventListener, TaskEvent};
pub use scheduler::{Scheduler, ServiceConfig};
pub use task::{CancelToken, TaskPriority, TaskRecord, TaskStatus};
