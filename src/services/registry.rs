//! Action registry: the catalog of executors, keyed by action type.
//!
//! Constructed once at process start and passed by `Arc` to the scheduler;
//! there is no ambient global lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ActionExecutor;

#[derive(Default)]
pub struct ActionRegistry {
    executors: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor. At most one executor per action type.
    pub fn register(&mut self, executor: Arc<dyn ActionExecutor>) -> DomainResult<()> {
        let action_type = executor.action_type().to_string();
        if self.executors.contains_key(&action_type) {
            return Err(DomainError::DuplicateActionType(action_type));
        }
        tracing::debug!(action_type = %action_type, "Registered action executor");
        self.executors.insert(action_type, executor);
        Ok(())
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.get(action_type).cloned()
    }

    /// Executors that can act for the given agent type. An executor with an
    /// empty compatibility list matches every agent type.
    pub fn compatible_with(&self, agent_type: &str) -> Vec<Arc<dyn ActionExecutor>> {
        self.executors
            .values()
            .filter(|e| {
                let compat = e.compatible_agent_types();
                compat.is_empty() || compat.iter().any(|a| a == agent_type)
            })
            .cloned()
            .collect()
    }

    /// Check that every required parameter key is present. Values are not
    /// type-checked.
    pub fn validate_config(
        &self,
        action_type: &str,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        match self.executors.get(action_type) {
            Some(executor) => executor
                .required_params()
                .iter()
                .all(|key| params.contains_key(key)),
            None => false,
        }
    }

    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("action_types", &self.action_types())
            .finish()
    }
}
