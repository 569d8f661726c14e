//! Sleep action — cooperative wait, used for load/cancellation testing.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::actions::definition::{ActionDefinition, ActionHandler, TaskContext};

/// How often the handler polls its cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Sleeps for `params.seconds`, checking the cancel flag between short
/// naps. Returns `{slept, interrupted}` — a partial result when cancelled.
pub struct SleepAction;

impl SleepAction {
    pub fn definition(service: &str) -> ActionDefinition {
        ActionDefinition::new("sleep", service)
            .with_description("Sleep for a number of seconds (cooperatively cancellable)")
            .with_dedupe()
    }
}

#[async_trait]
impl ActionHandler for SleepAction {
    async fn run(&self, ctx: TaskContext) -> anyhow::Result<Value> {
        let seconds = ctx
            .params()
            .get("seconds")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.1);
        let total = Duration::from_secs_f64(seconds.max(0.0));
        let start = Instant::now();

        while start.elapsed() < total {
            if ctx.is_cancel_requested() {
                return Ok(json!({
                    "slept": start.elapsed().as_secs_f64(),
                    "interrupted": true,
                }));
            }
            let remaining = total - start.elapsed();
            tokio::time::sleep(remaining.min(CANCEL_POLL)).await;
        }

        Ok(json!({
            "slept": total.as_secs_f64(),
            "interrupted": false,
        }))
    }
}
