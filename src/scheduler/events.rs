//! Event side-channel — status transitions broadcast to listeners and WS clients.
//!
//! Every status transition produces a `TaskEvent`. Registered callbacks are
//! invoked synchronously after scheduler locks are released and must not
//! block; the broadcast channel feeds WebSocket fan-out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::task::TaskRecord;

/// Kind of a task lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Queued,
    Started,
    Progress,
    Completed,
    Failed,
    Cancelled,
}

impl EventKind {
    /// Whether this event marks a terminal transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A task lifecycle event pushed to listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Snapshot of the task at transition time.
    pub task: TaskRecord,
    /// Structured extra payload (progress data, chunk contents).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl TaskEvent {
    pub fn new(kind: EventKind, task: TaskRecord) -> Self {
        Self {
            kind,
            task,
            extra: None,
        }
    }

    pub fn with_extra(kind: EventKind, task: TaskRecord, extra: serde_json::Value) -> Self {
        Self {
            kind,
            task,
            extra: Some(extra),
        }
    }
}

/// Registered push listener. Must never block.
pub type EventListener = Arc<dyn Fn(&TaskEvent) + Send + Sync>;
