//! Task model — priority, status state machine, record, cancel token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduling priority within one service's queue.
///
/// Only orders tasks inside the same service; cross-service scheduling is
/// independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl TaskPriority {
    /// Numeric rank — lower is served first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// State of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in its service queue for a free slot.
    Queued,
    /// Handler is executing.
    Running,
    /// Handler is executing and has emitted partial result chunks.
    Streaming,
    /// Handler returned successfully.
    Completed,
    /// Handler returned an error.
    Failed,
    /// Cancelled while queued, or handler returned after a cancel request.
    Cancelled,
}

impl TaskStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Queued, Running) | (Queued, Cancelled) |
            (Running, Streaming) |
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) |
            (Streaming, Completed) | (Streaming, Failed) | (Streaming, Cancelled)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the task is active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "streaming" => Ok(Self::Streaming),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Cooperative cancellation flag, bound 1:1 to a task id.
///
/// The dispatch loop sets it; the running handler polls it at safe points
/// and returns a best-effort partial result. Nothing is ever forcibly
/// terminated.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One unit of work and its full lifecycle state.
///
/// The scheduler owns the authoritative copy for the process lifetime;
/// external layers only ever see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub action_id: String,
    /// Concurrency-accounting bucket this task belongs to.
    pub service: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Invocation payload, opaque to the scheduler beyond dedup-key derivation.
    pub context: serde_json::Value,
    pub params: serde_json::Value,
    /// Populated exactly once, on the corresponding terminal transition.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Mirror of the cancel token, for caller introspection.
    pub cancel_requested: bool,
    /// Parent task id — used only for the cancel cascade.
    pub group_id: Option<Uuid>,
    /// Controller tasks are dispatched without occupying a concurrency slot.
    pub skip_concurrency: bool,
    pub dedupe_ctx_key: Option<String>,
    pub dedupe_params_key: Option<String>,
    /// Ordered accumulator for streaming partial results.
    pub chunks: Vec<serde_json::Value>,
}

impl TaskRecord {
    /// Create a freshly-submitted record in `queued` status.
    pub fn new(
        action_id: impl Into<String>,
        service: impl Into<String>,
        context: serde_json::Value,
        params: serde_json::Value,
        priority: TaskPriority,
        group_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id: action_id.into(),
            service: service.into(),
            priority,
            status: TaskStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            context,
            params,
            result: None,
            error: None,
            cancel_requested: false,
            group_id,
            skip_concurrency: false,
            dedupe_ctx_key: None,
            dedupe_params_key: None,
            chunks: Vec::new(),
        }
    }

    /// Transition to a new status, enforcing the state machine.
    ///
    /// Updates `started_at`/`finished_at` on the corresponding edges.
    pub fn transition_to(&mut self, status: TaskStatus) -> Result<(), String> {
        if !self.status.can_transition_to(status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status, status
            ));
        }

        self.status = status;

        match status {
            TaskStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.finished_at = Some(Utc::now());
            }
            _ => {}
        }

        Ok(())
    }

    /// Duration from start to finish (or now, if still running).
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            let end = self.finished_at.unwrap_or_else(Utc::now);
            let d = end.signed_duration_since(start);
            Duration::from_millis(d.num_milliseconds().max(0) as u64)
        })
    }

    /// Is this a top-level task (no group parent)?
    pub fn is_top_level(&self) -> bool {
        self.group_id.is_none()
    }
}
