//! libSQL backend — async `HistoryStore` implementation.
//!
//! Supports local file and in-memory databases; one connection is reused
//! for all operations (`libsql::Connection` is safe for concurrent async
//! use).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::scheduler::task::TaskStatus;
use crate::store::migrations;
use crate::store::traits::{HistoryStore, TaskHistoryRecord};

/// libSQL history backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "History database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string (our canonical write format).
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_datetime(&s))
}

/// Map a libsql row to a history record.
///
/// Column order: 0:task_id, 1:action_id, 2:service, 3:status,
/// 4:submitted_at, 5:started_at, 6:finished_at, 7:duration_ms,
/// 8:items_sent, 9:item_id, 10:error
fn row_to_record(row: &libsql::Row) -> Result<TaskHistoryRecord, libsql::Error> {
    let task_id: String = row.get(0)?;
    let action_id: String = row.get(1)?;
    let service: String = row.get(2)?;
    let status: String = row.get(3)?;
    let submitted_at: String = row.get(4)?;
    let started_at: Option<String> = row.get(5)?;
    let finished_at: Option<String> = row.get(6)?;
    let duration_ms: Option<i64> = row.get(7)?;
    let items_sent: Option<i64> = row.get(8)?;
    let item_id: Option<String> = row.get(9)?;
    let error: Option<String> = row.get(10)?;

    Ok(TaskHistoryRecord {
        task_id: Uuid::parse_str(&task_id).unwrap_or_else(|_| Uuid::nil()),
        action_id,
        service,
        status: status.parse().unwrap_or(TaskStatus::Failed),
        submitted_at: parse_datetime(&submitted_at),
        started_at: parse_optional_datetime(started_at),
        finished_at: parse_optional_datetime(finished_at),
        duration_ms,
        items_sent: items_sent.map(|n| n as u32),
        item_id,
        error,
    })
}

#[async_trait]
impl HistoryStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn record_task(&self, record: &TaskHistoryRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO task_history
                 (task_id, action_id, service, status, submitted_at, started_at,
                  finished_at, duration_ms, items_sent, item_id, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                libsql::params![
                    record.task_id.to_string(),
                    record.action_id.clone(),
                    record.service.clone(),
                    record.status.to_string(),
                    record.submitted_at.to_rfc3339(),
                    record.started_at.map(|t| t.to_rfc3339()),
                    record.finished_at.map(|t| t.to_rfc3339()),
                    record.duration_ms,
                    record.items_sent.map(|n| n as i64),
                    record.item_id.clone(),
                    record.error.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert history row: {e}")))?;
        Ok(())
    }

    async fn list_history(
        &self,
        service: Option<&str>,
        status: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TaskHistoryRecord>, DatabaseError> {
        let mut sql = String::from(
            "SELECT task_id, action_id, service, status, submitted_at, started_at,
                    finished_at, duration_ms, items_sent, item_id, error
             FROM task_history",
        );
        let mut clauses = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        if let Some(service) = service {
            params.push(libsql::Value::from(service.to_string()));
            clauses.push(format!("service = ?{}", params.len()));
        }
        if let Some(status) = status {
            params.push(libsql::Value::from(status.to_string()));
            clauses.push(format!("status = ?{}", params.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        params.push(libsql::Value::from(limit as i64));
        sql.push_str(&format!(
            " ORDER BY finished_at DESC LIMIT ?{}",
            params.len()
        ));

        let mut rows = self
            .conn()
            .query(&sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query history: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read history row: {e}")))?
        {
            records.push(
                row_to_record(&row)
                    .map_err(|e| DatabaseError::Serialization(format!("Bad history row: {e}")))?,
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::{TaskPriority, TaskRecord};

    fn row(action: &str, service: &str, status: TaskStatus, error: Option<&str>) -> TaskHistoryRecord {
        let mut record = TaskRecord::new(
            action,
            service,
            serde_json::json!({}),
            serde_json::json!({"item_id": "item-1"}),
            TaskPriority::Normal,
            None,
        );
        record.status = status;
        record.started_at = Some(Utc::now());
        record.finished_at = Some(Utc::now());
        record.error = error.map(String::from);
        TaskHistoryRecord::from_task(&record, 2)
    }

    #[tokio::test]
    async fn record_and_list_roundtrip() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let saved = row("tag_image", "tagger", TaskStatus::Completed, None);
        store.record_task(&saved).await.unwrap();

        let rows = store.list_history(None, None, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        let got = &rows[0];
        assert_eq!(got.task_id, saved.task_id);
        assert_eq!(got.action_id, "tag_image");
        assert_eq!(got.status, TaskStatus::Completed);
        assert_eq!(got.items_sent, Some(2));
        assert_eq!(got.item_id.as_deref(), Some("item-1"));
        assert!(got.error.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_service_and_status() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .record_task(&row("a", "tagger", TaskStatus::Completed, None))
            .await
            .unwrap();
        store
            .record_task(&row("b", "tagger", TaskStatus::Failed, Some("boom")))
            .await
            .unwrap();
        store
            .record_task(&row("c", "slow", TaskStatus::Completed, None))
            .await
            .unwrap();

        assert_eq!(store.list_history(Some("tagger"), None, 10).await.unwrap().len(), 2);
        assert_eq!(
            store
                .list_history(Some("tagger"), Some("failed"), 10)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(store.list_history(None, Some("completed"), 10).await.unwrap().len(), 2);
        assert_eq!(store.list_history(None, None, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn newest_first_ordering() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let mut older = row("old", "svc", TaskStatus::Completed, None);
        older.finished_at = Some(Utc::now() - chrono::Duration::seconds(60));
        store.record_task(&older).await.unwrap();
        store
            .record_task(&row("new", "svc", TaskStatus::Completed, None))
            .await
            .unwrap();

        let rows = store.list_history(None, None, 10).await.unwrap();
        assert_eq!(rows[0].action_id, "new");
        assert_eq!(rows[1].action_id, "old");
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn local_file_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            store
                .record_task(&row("persisted", "svc", TaskStatus::Completed, None))
                .await
                .unwrap();
        }
        let store = LibSqlBackend::new_local(&path).await.unwrap();
        let rows = store.list_history(None, None, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action_id, "persisted");
    }
}
