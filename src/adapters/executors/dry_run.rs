//! Dry-run action executor.
//!
//! Logs the remediation it would have performed and echoes its parameters
//! back as result data. Used to wire the loop end-to-end before real
//! platform executors are plugged in, and as the default for the shipped
//! binary. Rollback is supported and equally effect-free.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActionParams, ActionPriority, ExecutionResult};
use crate::domain::ports::ActionExecutor;

pub struct DryRunExecutor {
    action_type: String,
    priority: ActionPriority,
    max_retries: u32,
    required_params: Vec<String>,
    compatible_agent_types: Vec<String>,
}

impl DryRunExecutor {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            priority: ActionPriority::Medium,
            max_retries: 3,
            required_params: Vec::new(),
            compatible_agent_types: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_required_params(mut self, params: Vec<String>) -> Self {
        self.required_params = params;
        self
    }

    pub fn with_compatible_agent_types(mut self, agent_types: Vec<String>) -> Self {
        self.compatible_agent_types = agent_types;
        self
    }
}

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    fn action_type(&self) -> &str {
        &self.action_type
    }

    fn compatible_agent_types(&self) -> Vec<String> {
        self.compatible_agent_types.clone()
    }

    fn priority(&self) -> ActionPriority {
        self.priority
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn required_params(&self) -> Vec<String> {
        self.required_params.clone()
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    async fn validate(&self, params: &ActionParams) -> DomainResult<bool> {
        Ok(self
            .required_params
            .iter()
            .all(|key| params.config.contains_key(key)))
    }

    async fn execute(&self, params: &ActionParams) -> DomainResult<ExecutionResult> {
        tracing::info!(
            action_type = %self.action_type,
            agent_type = %params.agent_type,
            campaign_id = params.campaign_id.as_deref().unwrap_or("-"),
            trigger_value = params.trigger_value.unwrap_or(f64::NAN),
            "Dry run: would execute remediation"
        );

        let echo = serde_json::json!({
            "action_type": self.action_type,
            "agent_type": params.agent_type,
            "campaign_id": params.campaign_id,
            "trigger_value": params.trigger_value,
            "threshold": params.threshold,
        });

        Ok(ExecutionResult::ok(format!(
            "dry run: {} acknowledged",
            self.action_type
        ))
        .with_data(echo.clone())
        .with_rollback_data(echo))
    }

    async fn rollback(
        &self,
        params: &ActionParams,
        rollback_data: &serde_json::Value,
    ) -> DomainResult<ExecutionResult> {
        tracing::info!(
            action_type = %self.action_type,
            agent_type = %params.agent_type,
            "Dry run: would roll back remediation"
        );
        Ok(
            ExecutionResult::ok(format!("dry run: {} rolled back", self.action_type))
                .with_data(rollback_data.clone()),
        )
    }
}

/// Registry contents for the shipped binary: dry-run executors for the
/// standard remediation catalog.
pub fn default_executors() -> Vec<DryRunExecutor> {
    vec![
        DryRunExecutor::new("pause_campaign")
            .with_priority(ActionPriority::Critical)
            .with_max_retries(3),
        DryRunExecutor::new("adjust_budget")
            .with_priority(ActionPriority::High)
            .with_max_retries(3),
        DryRunExecutor::new("notify_team")
            .with_priority(ActionPriority::Medium)
            .with_max_retries(5),
        DryRunExecutor::new("generate_report")
            .with_priority(ActionPriority::Low)
            .with_max_retries(2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validate_checks_required_config_keys() {
        let executor = DryRunExecutor::new("pause_campaign")
            .with_required_params(vec!["reason".to_string()]);
        let mut params = ActionParams::manual("ppc", ActionPriority::Medium);

        assert!(!executor.validate(&params).await.unwrap());

        params
            .config
            .insert("reason".to_string(), serde_json::json!("cpc spike"));
        assert!(executor.validate(&params).await.unwrap());
    }

    #[tokio::test]
    async fn execute_captures_rollback_data() {
        let executor = DryRunExecutor::new("adjust_budget");
        let params = ActionParams::manual("ppc", ActionPriority::High);

        let result = executor.execute(&params).await.unwrap();
        assert!(result.success);
        let rollback_data = result.rollback_data.expect("rollback data captured");

        let reversed = executor.rollback(&params, &rollback_data).await.unwrap();
        assert!(reversed.success);
    }
}
