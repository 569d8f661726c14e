//! `HistoryStore` trait — durable terminal-state records for top-level tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::scheduler::task::{TaskRecord, TaskStatus};

/// A persisted summary of one terminal, top-level task.
///
/// Children are deliberately excluded so history stays bounded at the
/// user-visible-operation granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistoryRecord {
    pub task_id: Uuid,
    pub action_id: String,
    pub service: String,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    /// Number of spawned children, when any.
    pub items_sent: Option<u32>,
    /// Single-item identifier, when the submission carried one.
    pub item_id: Option<String>,
    pub error: Option<String>,
}

impl TaskHistoryRecord {
    /// Build a history row from a terminal task record.
    pub fn from_task(record: &TaskRecord, children: usize) -> Self {
        Self {
            task_id: record.id,
            action_id: record.action_id.clone(),
            service: record.service.clone(),
            status: record.status,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            duration_ms: record.elapsed().map(|d| d.as_millis() as i64),
            items_sent: (children > 0).then_some(children as u32),
            item_id: record
                .params
                .get("item_id")
                .and_then(|v| v.as_str())
                .map(String::from),
            error: record.error.clone(),
        }
    }
}

/// Backend-agnostic history persistence.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Persist (or overwrite) one terminal task summary.
    async fn record_task(&self, record: &TaskHistoryRecord) -> Result<(), DatabaseError>;

    /// Query history newest-first, optionally filtered by service/status,
    /// up to `limit` rows.
    async fn list_history(
        &self,
        service: Option<&str>,
        status: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TaskHistoryRecord>, DatabaseError>;
}
