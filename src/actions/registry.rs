//! Action registry — maps action ids to handler-backed variants.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::RegistryError;

use super::definition::{ActionDefinition, ActionHandler};

/// One registered variant of an action.
#[derive(Clone)]
struct ActionVariant {
    definition: ActionDefinition,
    handler: Arc<dyn ActionHandler>,
}

/// Registry of available actions, populated at startup.
///
/// An action id may carry several variants (e.g., a single-item and a bulk
/// form). Resolution picks the **first-registered variant whose handler
/// accepts the context** — registration order is the explicit tie-break
/// policy, not incidental iteration order.
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Vec<ActionVariant>>>,
}

impl ActionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
        }
    }

    /// Register an action variant. Variants append in call order.
    pub async fn register(&self, definition: ActionDefinition, handler: Arc<dyn ActionHandler>) {
        debug!(action = %definition.id, service = %definition.service, "Registered action");
        self.actions
            .write()
            .await
            .entry(definition.id.clone())
            .or_default()
            .push(ActionVariant {
                definition,
                handler,
            });
    }

    /// Resolve an action id + invocation context to a concrete
    /// `(definition, handler)` pair.
    pub async fn resolve(
        &self,
        action_id: &str,
        context: &Value,
    ) -> Result<(ActionDefinition, Arc<dyn ActionHandler>), RegistryError> {
        let actions = self.actions.read().await;
        let variants = actions
            .get(action_id)
            .ok_or_else(|| RegistryError::ActionNotFound {
                id: action_id.to_string(),
            })?;

        variants
            .iter()
            .find(|v| v.handler.applies_to(context))
            .map(|v| (v.definition.clone(), Arc::clone(&v.handler)))
            .ok_or_else(|| RegistryError::NotApplicable {
                id: action_id.to_string(),
            })
    }

    /// Check if an action id exists.
    pub async fn has(&self, action_id: &str) -> bool {
        self.actions.read().await.contains_key(action_id)
    }

    /// All registered definitions, grouped by id in registration order.
    pub async fn list(&self) -> Vec<ActionDefinition> {
        let mut defs: Vec<ActionDefinition> = self
            .actions
            .read()
            .await
            .values()
            .flat_map(|variants| variants.iter().map(|v| v.definition.clone()))
            .collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }

    /// Number of registered action ids.
    pub fn count(&self) -> usize {
        self.actions.try_read().map(|a| a.len()).unwrap_or(0)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
