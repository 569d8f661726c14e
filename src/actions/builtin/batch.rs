//! Batch controller action — spawns and supervises a group of children.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::actions::definition::{ActionDefinition, ActionHandler, TaskContext};
use crate::scheduler::task::{TaskPriority, TaskStatus};

use super::sleep::SleepAction;

/// How often a holding controller polls its group.
const GROUP_POLL: Duration = Duration::from_millis(20);

/// Controller that fans a batch out as child tasks and, with
/// `params.hold = true`, waits for the group to settle.
///
/// The controller itself does no service work: it marks itself
/// slot-exempt before spawning, so its children (ordinary slot-consuming
/// tasks) are what the concurrency gate meters.
pub struct BatchAction {
    child_definition: ActionDefinition,
    child_handler: Arc<dyn ActionHandler>,
}

impl BatchAction {
    pub fn new(child_definition: ActionDefinition, child_handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            child_definition,
            child_handler,
        }
    }

    /// Batch of sleep children on the given service.
    pub fn sleep_batch(service: &str) -> Self {
        Self::new(SleepAction::definition(service), Arc::new(SleepAction))
    }

    pub fn definition(service: &str) -> ActionDefinition {
        ActionDefinition::new("batch", service)
            .with_description("Spawn a batch of child tasks and supervise them")
            .as_controller()
    }
}

#[async_trait]
impl ActionHandler for BatchAction {
    async fn run(&self, ctx: TaskContext) -> anyhow::Result<Value> {
        let count = ctx
            .params()
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(3) as usize;
        let seconds = ctx
            .params()
            .get("seconds")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.1);
        let hold = ctx
            .params()
            .get("hold")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        // Submitted as a regular task? Make sure no slot stays taken while
        // the children run.
        ctx.mark_controller().await;

        for index in 0..count {
            ctx.submit_child(
                self.child_definition.clone(),
                Arc::clone(&self.child_handler),
                ctx.context().clone(),
                json!({"seconds": seconds, "index": index}),
                TaskPriority::Normal,
            )
            .await;
        }
        ctx.emit_progress(json!({"completed": 0, "total": count})).await;

        if !hold {
            return Ok(json!({"spawned": count, "held": false}));
        }

        // Poll the group until every child is terminal or we are cancelled.
        // The cancel cascade reaches the children on its own; returning
        // early here just reports what was observed so far.
        let mut last_done = 0usize;
        loop {
            let children = ctx.children().await;
            let done = children
                .iter()
                .filter(|c| c.status.is_terminal())
                .count();
            if done != last_done {
                last_done = done;
                ctx.emit_progress(json!({"completed": done, "total": count})).await;
            }
            if done == children.len() && children.len() == count {
                break;
            }
            if ctx.is_cancel_requested() {
                break;
            }
            tokio::time::sleep(GROUP_POLL).await;
        }

        let children = ctx.children().await;
        let tally = |status: TaskStatus| children.iter().filter(|c| c.status == status).count();
        Ok(json!({
            "spawned": count,
            "held": true,
            "completed": tally(TaskStatus::Completed),
            "failed": tally(TaskStatus::Failed),
            "cancelled": tally(TaskStatus::Cancelled),
            "interrupted": ctx.is_cancel_requested(),
        }))
    }
}
