//! Task scheduler — priority queues, per-service concurrency gate,
//! controller/group cancel cascade, dedup guard, event/history sink.
//!
//! One coordinating dispatch loop wakes on a fixed interval and promotes
//! queued tasks into detached `tokio::spawn` units up to each service's
//! free capacity. Handlers call back into `finalize` when they return;
//! that path releases slots immediately so queued successors can start on
//! the very next tick.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actions::definition::{ActionDefinition, ActionHandler, TaskContext};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::store::traits::{HistoryStore, TaskHistoryRecord};

use super::dedupe::fingerprint;
use super::events::{EventKind, EventListener, TaskEvent};
use super::queue::ServiceQueues;
use super::task::{CancelToken, TaskPriority, TaskRecord, TaskStatus};

/// Per-service execution settings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceConfig {
    pub max_concurrency: usize,
    pub backing_url: Option<String>,
}

/// One tracked task: authoritative record plus execution material.
struct TaskEntry {
    record: TaskRecord,
    definition: ActionDefinition,
    handler: Arc<dyn ActionHandler>,
    cancel: CancelToken,
    /// Whether this task currently occupies a concurrency slot.
    holds_slot: bool,
}

/// Mutable scheduler state — one mutual-exclusion domain for the task
/// table, wait queues, running counters, and service configs.
struct SchedulerState {
    tasks: HashMap<Uuid, TaskEntry>,
    queues: ServiceQueues,
    running: HashMap<String, usize>,
    services: HashMap<String, ServiceConfig>,
}

/// A promotion decided under the state lock, launched after release.
struct Launch {
    task_id: Uuid,
    handler: Arc<dyn ActionHandler>,
    context: Value,
    params: Value,
    cancel: CancelToken,
}

/// The task scheduler/manager.
///
/// Owns the authoritative copy of every `TaskRecord` for the process
/// lifetime; external layers read clones and request mutations through
/// `submit` / `cancel`.
pub struct Scheduler {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    history: Option<Arc<dyn HistoryStore>>,
    events_tx: broadcast::Sender<TaskEvent>,
    listeners: std::sync::RwLock<Vec<EventListener>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a new scheduler. The dispatch loop does not run until
    /// `start` is called; services may be configured before or after.
    pub fn new(config: SchedulerConfig, history: Option<Arc<dyn HistoryStore>>) -> Arc<Self> {
        let (events_tx, _rx) = broadcast::channel(config.event_buffer);
        Arc::new(Self {
            config,
            state: Mutex::new(SchedulerState {
                tasks: HashMap::new(),
                queues: ServiceQueues::new(),
                running: HashMap::new(),
                services: HashMap::new(),
            }),
            history,
            events_tx,
            listeners: std::sync::RwLock::new(Vec::new()),
            loop_handle: Mutex::new(None),
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the dispatch loop. Idempotent.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.loop_handle.lock().await;
        if handle.is_some() {
            return;
        }
        let scheduler = Arc::clone(self);
        let interval = self.config.tick_interval;
        info!(
            name = %self.config.name,
            interval_ms = interval.as_millis() as u64,
            "Dispatch loop started"
        );
        *handle = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                scheduler.tick().await;
            }
        }));
    }

    /// Stop the dispatch loop. Running handlers are not interrupted.
    pub async fn stop(&self) {
        if let Some(handle) = self.loop_handle.lock().await.take() {
            handle.abort();
            info!("Dispatch loop stopped");
        }
    }

    /// Configure a service's concurrency limit (and optional backing URL).
    /// Callable both before and after `start`.
    pub async fn configure_service(
        &self,
        name: &str,
        max_concurrency: usize,
        backing_url: Option<String>,
    ) {
        let mut state = self.state.lock().await;
        info!(service = name, max_concurrency, "Service configured");
        state.services.insert(
            name.to_string(),
            ServiceConfig {
                max_concurrency: max_concurrency.max(1),
                backing_url,
            },
        );
    }

    /// Configured services, for introspection.
    pub async fn services(&self) -> HashMap<String, ServiceConfig> {
        self.state.lock().await.services.clone()
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Accept a resolved action for execution. Never blocks on execution;
    /// the dispatch loop promotes the task later.
    pub async fn submit(
        &self,
        definition: ActionDefinition,
        handler: Arc<dyn ActionHandler>,
        context: Value,
        params: Value,
        priority: TaskPriority,
        group_id: Option<Uuid>,
    ) -> TaskRecord {
        let mut record = TaskRecord::new(
            &definition.id,
            &definition.service,
            context,
            params,
            priority,
            group_id,
        );
        record.skip_concurrency = definition.controller;
        record.dedupe_ctx_key = Some(fingerprint(&record.context));
        record.dedupe_params_key = Some(fingerprint(&record.params));

        let snapshot = record.clone();
        {
            let mut state = self.state.lock().await;
            state.tasks.insert(
                record.id,
                TaskEntry {
                    record,
                    definition,
                    handler,
                    cancel: CancelToken::new(),
                    holds_slot: false,
                },
            );
        }

        info!(
            task_id = %snapshot.id,
            action = %snapshot.action_id,
            service = %snapshot.service,
            priority = %snapshot.priority,
            group_id = ?snapshot.group_id,
            "Task submitted"
        );
        // The `queued` event goes out before the task enters its wait queue,
        // so no dispatch tick can publish `started` ahead of it.
        self.emit(TaskEvent::new(EventKind::Queued, snapshot.clone()));

        {
            let mut state = self.state.lock().await;
            // A cancel may have landed between the two locks; its queue entry
            // is skipped lazily either way.
            state.queues.push(&snapshot.service, snapshot.id, priority);
        }
        snapshot
    }

    /// Advisory pre-submission duplicate check.
    ///
    /// Matches non-terminal tasks with the same action id, the same handler
    /// identity, and equal context/params fingerprints. Skipped entirely
    /// unless the definition opts into deduplication. Read-only; a race
    /// with a concurrent `submit` is acceptable.
    pub async fn find_duplicate(
        &self,
        definition: &ActionDefinition,
        handler: &Arc<dyn ActionHandler>,
        context: &Value,
        params: &Value,
    ) -> Option<TaskRecord> {
        if !definition.deduplicate_submissions {
            return None;
        }
        let ctx_key = fingerprint(context);
        let params_key = fingerprint(params);

        let state = self.state.lock().await;
        state
            .tasks
            .values()
            .filter(|e| e.record.status.is_active())
            .filter(|e| e.record.action_id == definition.id)
            .filter(|e| Arc::ptr_eq(&e.handler, handler))
            .filter(|e| {
                e.record.dedupe_ctx_key.as_deref() == Some(ctx_key.as_str())
                    && e.record.dedupe_params_key.as_deref() == Some(params_key.as_str())
            })
            .min_by_key(|e| e.record.submitted_at)
            .map(|e| e.record.clone())
    }

    // ── Read model ──────────────────────────────────────────────────

    /// Snapshot of one task.
    pub async fn get(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.state
            .lock()
            .await
            .tasks
            .get(&task_id)
            .map(|e| e.record.clone())
    }

    /// Snapshots of all tasks, optionally filtered, oldest first.
    pub async fn list(
        &self,
        service: Option<&str>,
        status: Option<TaskStatus>,
    ) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<TaskRecord> = state
            .tasks
            .values()
            .filter(|e| service.is_none_or(|s| e.record.service == s))
            .filter(|e| status.is_none_or(|s| e.record.status == s))
            .map(|e| e.record.clone())
            .collect();
        records.sort_by_key(|r| r.submitted_at);
        records
    }

    /// Snapshots of the children of one group parent, oldest first.
    pub async fn list_group(&self, group_id: Uuid) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<TaskRecord> = state
            .tasks
            .values()
            .filter(|e| e.record.group_id == Some(group_id))
            .map(|e| e.record.clone())
            .collect();
        records.sort_by_key(|r| r.submitted_at);
        records
    }

    /// Number of running (slot-holding) tasks for a service.
    pub async fn running_count(&self, service: &str) -> usize {
        self.state
            .lock()
            .await
            .running
            .get(service)
            .copied()
            .unwrap_or(0)
    }

    // ── Cancellation ────────────────────────────────────────────────

    /// Request cancellation of a task and, recursively, of its non-terminal
    /// descendants.
    ///
    /// Queued targets transition to `cancelled` immediately; running ones
    /// get their cancel flag set and finalize once the handler returns.
    /// Unknown or already-terminal ids are rejected without touching state.
    pub async fn cancel(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        let mut events = Vec::new();
        let mut history_rows = Vec::new();
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            match state.tasks.get(&task_id) {
                Some(entry) if entry.record.status.is_active() => {}
                Some(entry) => {
                    return Err(SchedulerError::NotCancellable {
                        id: task_id,
                        status: entry.record.status,
                    });
                }
                None => return Err(SchedulerError::TaskNotFound { id: task_id }),
            }

            // Breadth-first collection of the group cascade.
            let mut targets = vec![task_id];
            let mut i = 0;
            while i < targets.len() {
                let parent = targets[i];
                i += 1;
                targets.extend(
                    state
                        .tasks
                        .values()
                        .filter(|e| {
                            e.record.group_id == Some(parent) && e.record.status.is_active()
                        })
                        .map(|e| e.record.id),
                );
            }

            let mut cancelled_now = Vec::new();
            for target in targets {
                let Some(entry) = state.tasks.get_mut(&target) else {
                    continue;
                };
                match entry.record.status {
                    TaskStatus::Queued => {
                        // Never took a slot; the queue entry is skipped lazily.
                        entry.cancel.cancel();
                        entry.record.cancel_requested = true;
                        if let Err(e) = entry.record.transition_to(TaskStatus::Cancelled) {
                            warn!(task_id = %target, error = %e, "Cancel transition rejected");
                            continue;
                        }
                        info!(task_id = %target, "Queued task cancelled");
                        events.push(TaskEvent::new(EventKind::Cancelled, entry.record.clone()));
                        cancelled_now.push(entry.record.clone());
                    }
                    TaskStatus::Running | TaskStatus::Streaming => {
                        entry.cancel.cancel();
                        entry.record.cancel_requested = true;
                        info!(task_id = %target, "Cancellation requested for running task");
                    }
                    _ => {}
                }
            }

            if self.history.is_some() {
                for record in cancelled_now.iter().filter(|r| r.is_top_level()) {
                    let children = state
                        .tasks
                        .values()
                        .filter(|e| e.record.group_id == Some(record.id))
                        .count();
                    history_rows.push(TaskHistoryRecord::from_task(record, children));
                }
            }
        }

        for event in events {
            self.emit(event);
        }
        for row in history_rows {
            self.spawn_history_write(row);
        }
        Ok(())
    }

    /// Convert an already-submitted task into a slot-exempt controller,
    /// releasing its slot immediately if it holds one.
    pub async fn mark_controller(&self, task_id: Uuid) -> bool {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(entry) = state.tasks.get_mut(&task_id) else {
            return false;
        };
        if entry.record.status.is_terminal() {
            return false;
        }
        entry.record.skip_concurrency = true;
        if entry.holds_slot {
            entry.holds_slot = false;
            if let Some(count) = state.running.get_mut(&entry.record.service) {
                *count = count.saturating_sub(1);
            }
            debug!(task_id = %task_id, service = %entry.record.service, "Controller released its slot");
        }
        true
    }

    // ── Progress & streaming ────────────────────────────────────────

    /// Publish structured interim state for a task without changing status.
    pub async fn emit_progress(&self, task_id: Uuid, payload: Value) {
        let snapshot = {
            let state = self.state.lock().await;
            state.tasks.get(&task_id).map(|e| e.record.clone())
        };
        if let Some(record) = snapshot {
            self.emit(TaskEvent::with_extra(EventKind::Progress, record, payload));
        }
    }

    /// Append a streaming partial-result chunk; the first chunk moves the
    /// task from `running` to `streaming`.
    pub async fn push_chunk(&self, task_id: Uuid, chunk: Value) {
        let snapshot = {
            let mut state = self.state.lock().await;
            let Some(entry) = state.tasks.get_mut(&task_id) else {
                return;
            };
            if entry.record.status.is_terminal() {
                return;
            }
            if entry.record.status == TaskStatus::Running {
                if let Err(e) = entry.record.transition_to(TaskStatus::Streaming) {
                    warn!(task_id = %task_id, error = %e, "Streaming transition rejected");
                }
            }
            entry.record.chunks.push(chunk.clone());
            entry.record.clone()
        };
        self.emit(TaskEvent::with_extra(
            EventKind::Progress,
            snapshot,
            serde_json::json!({ "chunk": chunk }),
        ));
    }

    // ── Event sink ──────────────────────────────────────────────────

    /// Register a push listener invoked on every status transition.
    /// Listeners must not block.
    pub fn on_event(&self, listener: impl Fn(&TaskEvent) + Send + Sync + 'static) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(Arc::new(listener));
        }
    }

    /// Subscribe to the broadcast event feed (WS fan-out).
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events_tx.subscribe()
    }

    /// Deliver an event to callbacks and the broadcast feed. Always called
    /// with the state lock released.
    fn emit(&self, event: TaskEvent) {
        if let Ok(listeners) = self.listeners.read() {
            for listener in listeners.iter() {
                listener(&event);
            }
        }
        // Ok if no receivers are listening yet.
        let _ = self.events_tx.send(event);
    }

    // ── Dispatch loop ───────────────────────────────────────────────

    /// One dispatch tick: promote eligible queued tasks per service.
    /// Controllers are promoted regardless of free slots; others fill
    /// capacity in priority-then-arrival order.
    pub async fn tick(self: &Arc<Self>) {
        let mut events = Vec::new();
        let mut launches = Vec::new();
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            for service in state.queues.services_with_waiting() {
                let limit = state
                    .services
                    .get(&service)
                    .map(|c| c.max_concurrency)
                    .unwrap_or(self.config.default_max_concurrency);
                let mut leftovers = Vec::new();

                while let Some(item) = state.queues.pop(&service) {
                    let Some(entry) = state.tasks.get_mut(&item.task_id) else {
                        continue;
                    };
                    // Cancelled-while-queued entries are dropped here.
                    if entry.record.status != TaskStatus::Queued {
                        continue;
                    }

                    if entry.record.skip_concurrency {
                        // Controllers never take a slot.
                    } else if state.running.get(&service).copied().unwrap_or(0) < limit {
                        *state.running.entry(service.clone()).or_insert(0) += 1;
                        entry.holds_slot = true;
                    } else {
                        // Keep scanning — a controller may sit behind the
                        // blocked head of the queue.
                        leftovers.push(item);
                        continue;
                    }

                    if let Err(e) = entry.record.transition_to(TaskStatus::Running) {
                        // Guarded above: only queued entries reach this point.
                        warn!(task_id = %entry.record.id, error = %e, "Promotion rejected");
                        if entry.holds_slot {
                            entry.holds_slot = false;
                            if let Some(count) = state.running.get_mut(&service) {
                                *count = count.saturating_sub(1);
                            }
                        }
                        continue;
                    }
                    debug!(
                        task_id = %entry.record.id,
                        service = %service,
                        controller = entry.record.skip_concurrency,
                        "Task promoted to running"
                    );
                    events.push(TaskEvent::new(EventKind::Started, entry.record.clone()));
                    launches.push(Launch {
                        task_id: entry.record.id,
                        handler: Arc::clone(&entry.handler),
                        context: entry.record.context.clone(),
                        params: entry.record.params.clone(),
                        cancel: entry.cancel.clone(),
                    });
                }

                for item in leftovers {
                    state.queues.requeue(&service, item);
                }
            }
        }

        for event in events {
            self.emit(event);
        }
        for launch in launches {
            self.launch(launch);
        }
    }

    /// Run a promoted task as a detached unit of work; the loop never
    /// awaits handlers.
    fn launch(self: &Arc<Self>, launch: Launch) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let Launch {
                task_id,
                handler,
                context,
                params,
                cancel,
            } = launch;
            let ctx = TaskContext::new(task_id, context, params, cancel, Arc::clone(&scheduler));
            // Inner spawn so a panicking handler is contained and surfaces
            // as a failed task instead of a lost slot.
            let inner = tokio::spawn(async move { handler.run(ctx).await });
            let outcome = match inner.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("handler panicked: {join_err}")),
            };
            scheduler.finalize(task_id, outcome).await;
        });
    }

    /// Finalize a task after its handler returned. Releases the slot
    /// immediately, fires the terminal event, and persists history for
    /// top-level tasks.
    async fn finalize(&self, task_id: Uuid, outcome: anyhow::Result<Value>) {
        let mut history_row = None;
        let event = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(entry) = state.tasks.get_mut(&task_id) else {
                warn!(task_id = %task_id, "Finalize called for unknown task");
                return;
            };
            if entry.record.status.is_terminal() {
                return;
            }

            if entry.holds_slot {
                entry.holds_slot = false;
                if let Some(count) = state.running.get_mut(&entry.record.service) {
                    *count = count.saturating_sub(1);
                }
            }

            let (target, kind) = if entry.cancel.is_cancelled() {
                // Cancellation is not an error: keep `error` empty and any
                // partial result the handler managed to return.
                entry.record.cancel_requested = true;
                if let Ok(partial) = outcome {
                    entry.record.result = Some(partial);
                }
                (TaskStatus::Cancelled, EventKind::Cancelled)
            } else {
                match outcome {
                    Ok(value) => {
                        entry.record.result = Some(value);
                        (TaskStatus::Completed, EventKind::Completed)
                    }
                    Err(err) => {
                        entry.record.error = Some(err.to_string());
                        (TaskStatus::Failed, EventKind::Failed)
                    }
                }
            };
            if let Err(e) = entry.record.transition_to(target) {
                warn!(task_id = %task_id, error = %e, "Terminal transition rejected");
                return;
            }

            let record = entry.record.clone();
            info!(
                task_id = %task_id,
                action = %record.action_id,
                service = %record.service,
                status = %record.status,
                "Task finalized"
            );

            if record.is_top_level() && self.history.is_some() {
                let children = state
                    .tasks
                    .values()
                    .filter(|e| e.record.group_id == Some(task_id))
                    .count();
                history_row = Some(TaskHistoryRecord::from_task(&record, children));
            }
            TaskEvent::new(kind, record)
        };

        self.emit(event);
        if let Some(row) = history_row {
            self.spawn_history_write(row);
        }
    }

    /// Persist a terminal top-level record off the hot path.
    fn spawn_history_write(&self, row: TaskHistoryRecord) {
        if let Some(history) = &self.history {
            let history = Arc::clone(history);
            tokio::spawn(async move {
                if let Err(e) = history.record_task(&row).await {
                    warn!(task_id = %row.task_id, error = %e, "Failed to persist task history");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopHandler;

    #[async_trait]
    impl ActionHandler for NoopHandler {
        async fn run(&self, _ctx: TaskContext) -> anyhow::Result<Value> {
            Ok(json!({"ok": true}))
        }
    }

    fn definition(id: &str, service: &str) -> ActionDefinition {
        ActionDefinition::new(id, service)
    }

    #[tokio::test]
    async fn submit_is_queued_and_readable() {
        let scheduler = Scheduler::new(SchedulerConfig::default(), None);
        let handler: Arc<dyn ActionHandler> = Arc::new(NoopHandler);
        let record = scheduler
            .submit(
                definition("tag_image", "tagger"),
                handler,
                json!({"user": "default"}),
                json!({"item_id": "1"}),
                TaskPriority::Normal,
                None,
            )
            .await;

        assert_eq!(record.status, TaskStatus::Queued);
        assert!(record.dedupe_ctx_key.is_some());

        let fetched = scheduler.get(record.id).await.unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.status, TaskStatus::Queued);

        let listed = scheduler.list(Some("tagger"), Some(TaskStatus::Queued)).await;
        assert_eq!(listed.len(), 1);
        assert!(scheduler.list(Some("other"), None).await.is_empty());
    }

    #[tokio::test]
    async fn find_duplicate_requires_opt_in() {
        let scheduler = Scheduler::new(SchedulerConfig::default(), None);
        let handler: Arc<dyn ActionHandler> = Arc::new(NoopHandler);
        let plain = definition("tag_image", "tagger");
        scheduler
            .submit(
                plain.clone(),
                Arc::clone(&handler),
                json!({}),
                json!({"item_id": "1"}),
                TaskPriority::Normal,
                None,
            )
            .await;

        // Not opted in: no duplicate reported even for identical payloads.
        assert!(
            scheduler
                .find_duplicate(&plain, &handler, &json!({}), &json!({"item_id": "1"}))
                .await
                .is_none()
        );

        let deduped = definition("tag_image", "tagger").with_dedupe();
        let found = scheduler
            .find_duplicate(&deduped, &handler, &json!({}), &json!({"item_id": "1"}))
            .await;
        assert!(found.is_some());

        // Different params: no match.
        assert!(
            scheduler
                .find_duplicate(&deduped, &handler, &json!({}), &json!({"item_id": "2"}))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_check_ignores_other_handlers() {
        let scheduler = Scheduler::new(SchedulerConfig::default(), None);
        let handler_a: Arc<dyn ActionHandler> = Arc::new(NoopHandler);
        let handler_b: Arc<dyn ActionHandler> = Arc::new(NoopHandler);
        let def = definition("tag_image", "tagger").with_dedupe();
        scheduler
            .submit(
                def.clone(),
                Arc::clone(&handler_a),
                json!({}),
                json!({}),
                TaskPriority::Normal,
                None,
            )
            .await;

        assert!(
            scheduler
                .find_duplicate(&def, &handler_b, &json!({}), &json!({}))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn cancel_queued_goes_terminal_without_running() {
        let scheduler = Scheduler::new(SchedulerConfig::default(), None);
        let handler: Arc<dyn ActionHandler> = Arc::new(NoopHandler);
        let record = scheduler
            .submit(
                definition("tag_image", "tagger"),
                handler,
                json!({}),
                json!({}),
                TaskPriority::Normal,
                None,
            )
            .await;

        scheduler.cancel(record.id).await.unwrap();
        let cancelled = scheduler.get(record.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.started_at.is_none());
        assert!(cancelled.cancel_requested);
        assert!(cancelled.error.is_none());

        // Second cancel is rejected without touching the record.
        let err = scheduler.cancel(record.id).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotCancellable { .. }));
        // Unknown ids are distinguishable from terminal ones.
        let err = scheduler.cancel(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn queued_events_reach_listeners() {
        let scheduler = Scheduler::new(SchedulerConfig::default(), None);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scheduler.on_event(move |event| {
            sink.lock().unwrap().push(event.kind);
        });

        let handler: Arc<dyn ActionHandler> = Arc::new(NoopHandler);
        let record = scheduler
            .submit(
                definition("tag_image", "tagger"),
                handler,
                json!({}),
                json!({}),
                TaskPriority::Normal,
                None,
            )
            .await;
        scheduler.cancel(record.id).await.unwrap();

        let kinds = seen.lock().unwrap().clone();
        assert_eq!(kinds, vec![EventKind::Queued, EventKind::Cancelled]);
    }
}
