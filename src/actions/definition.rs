//! Action definitions and the handler contract.
//!
//! An action is a named, handler-backed operation scoped to a backing
//! service. The scheduler only ever receives an already-resolved
//! `(definition, handler)` pair; resolution lives in the registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::scheduler::Scheduler;
use crate::scheduler::task::{CancelToken, TaskPriority, TaskRecord};

/// Declarative metadata for one action variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Client-facing action identifier.
    pub id: String,
    /// Concurrency-accounting bucket the action runs in.
    pub service: String,
    pub description: String,
    /// Opt into the pre-submission duplicate check.
    #[serde(default)]
    pub deduplicate_submissions: bool,
    /// Controller actions are dispatched without taking a concurrency slot.
    #[serde(default)]
    pub controller: bool,
}

impl ActionDefinition {
    pub fn new(id: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            description: String::new(),
            deduplicate_submissions: false,
            controller: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dedupe(mut self) -> Self {
        self.deduplicate_submissions = true;
        self
    }

    pub fn as_controller(mut self) -> Self {
        self.controller = true;
        self
    }
}

/// Handler contract for one unit of work.
///
/// Handlers cooperate with cancellation by polling
/// `TaskContext::is_cancel_requested` at short intervals and returning an
/// early partial result. Errors are recorded verbatim on the task and never
/// cross the scheduler boundary.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, ctx: TaskContext) -> anyhow::Result<Value>;

    /// Whether this variant can serve the given invocation context.
    ///
    /// Used by the registry's first-applicable resolution; defaults to
    /// accepting everything.
    fn applies_to(&self, _context: &Value) -> bool {
        true
    }
}

impl std::fmt::Debug for dyn ActionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActionHandler")
    }
}

/// Per-invocation handle passed to a running handler.
///
/// Carries the handler's own copies of context/params, its cancel token,
/// and an explicit scheduler handle for spawning children — there is no
/// ambient singleton to import.
#[derive(Clone)]
pub struct TaskContext {
    task_id: Uuid,
    context: Value,
    params: Value,
    cancel: CancelToken,
    scheduler: Arc<Scheduler>,
}

impl TaskContext {
    pub fn new(
        task_id: Uuid,
        context: Value,
        params: Value,
        cancel: CancelToken,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            task_id,
            context,
            params,
            cancel,
            scheduler,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Has cancellation been requested for this task?
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Convert this task into a slot-exempt controller.
    pub async fn mark_controller(&self) -> bool {
        self.scheduler.mark_controller(self.task_id).await
    }

    /// Publish structured interim state without changing status.
    pub async fn emit_progress(&self, payload: Value) {
        self.scheduler.emit_progress(self.task_id, payload).await;
    }

    /// Append a streaming partial-result chunk (first chunk moves the task
    /// to `streaming`).
    pub async fn push_chunk(&self, chunk: Value) {
        self.scheduler.push_chunk(self.task_id, chunk).await;
    }

    /// Submit a child task sharing this task's id as its group id.
    pub async fn submit_child(
        &self,
        definition: ActionDefinition,
        handler: Arc<dyn ActionHandler>,
        context: Value,
        params: Value,
        priority: TaskPriority,
    ) -> TaskRecord {
        self.scheduler
            .submit(
                definition,
                handler,
                context,
                params,
                priority,
                Some(self.task_id),
            )
            .await
    }

    /// Current snapshots of this task's children.
    pub async fn children(&self) -> Vec<TaskRecord> {
        self.scheduler.list_group(self.task_id).await
    }
}
