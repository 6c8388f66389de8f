//! Trigger evaluation: matching rules against recent metric observations.
//!
//! `TriggerEvaluator` is pure and synchronous: it takes a snapshot of rules
//! and observations, applies scope/window filtering and condition logic, and
//! emits at most one `ActionTrigger` per rule. A malformed rule is logged
//! and skipped; it never aborts the pass.

use chrono::{DateTime, Utc};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionMetadata, ActionParams, ActionTrigger, ConditionKind, MetricObservation, Rule,
    TriggerCondition,
};

/// Tolerance for `equals` comparisons on metric values.
const EQUALS_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    epsilon: f64,
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self {
            epsilon: EQUALS_EPSILON,
        }
    }

    /// Evaluate all rules against the observation snapshot.
    ///
    /// Observations may arrive in any order; they are sorted newest-first
    /// once and each rule filters that shared view.
    pub fn evaluate(
        &self,
        rules: &[Rule],
        metrics: &[MetricObservation],
        now: DateTime<Utc>,
    ) -> Vec<ActionTrigger> {
        let mut ordered: Vec<&MetricObservation> = metrics.iter().collect();
        ordered.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        let mut triggers = Vec::new();
        for rule in rules {
            match self.evaluate_rule(rule, &ordered, now) {
                Ok(Some(trigger)) => triggers.push(trigger),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        rule_name = %rule.name,
                        error = %e,
                        "Skipping rule after evaluation error"
                    );
                }
            }
        }
        triggers
    }

    fn evaluate_rule(
        &self,
        rule: &Rule,
        ordered: &[&MetricObservation],
        now: DateTime<Utc>,
    ) -> DomainResult<Option<ActionTrigger>> {
        if !rule.enabled || rule.in_cooldown(now) {
            return Ok(None);
        }

        rule.condition.validate().map_err(|e| DomainError::RuleEvaluation {
            rule: rule.name.clone(),
            reason: e.to_string(),
        })?;

        // Scope filter, then window filter. Order (newest first) is preserved.
        let mut relevant: Vec<&MetricObservation> = ordered
            .iter()
            .copied()
            .filter(|obs| scope_matches(rule, obs))
            .collect();
        if let Some(window) = rule.condition.window {
            let cutoff = now
                - chrono::Duration::from_std(window)
                    .unwrap_or_else(|_| chrono::Duration::days(36_500));
            relevant.retain(|obs| obs.recorded_at > cutoff);
        }

        if relevant.is_empty() {
            return Ok(None);
        }

        if !self.condition_met(&rule.condition, &relevant) {
            return Ok(None);
        }

        Ok(Some(self.build_trigger(rule, &relevant, now)))
    }

    fn condition_met(&self, cond: &TriggerCondition, newest_first: &[&MetricObservation]) -> bool {
        match cond.kind {
            ConditionKind::GreaterThan
            | ConditionKind::LessThan
            | ConditionKind::Equals
            | ConditionKind::ConsecutiveViolations => {
                let threshold = match cond.threshold {
                    Some(t) => t,
                    None => return false,
                };
                let satisfies = |v: f64| self.compare(cond.kind, v, threshold);

                if cond.consecutive_count <= 1 {
                    newest_first.iter().any(|obs| satisfies(obs.value))
                } else {
                    // The unbroken run at the newest end must reach N; one
                    // non-satisfying observation inside it prevents firing.
                    let run = newest_first
                        .iter()
                        .take_while(|obs| satisfies(obs.value))
                        .count();
                    run >= cond.consecutive_count as usize
                }
            }
            ConditionKind::ChangePercent => self.change_percent_met(cond, newest_first),
        }
    }

    fn compare(&self, kind: ConditionKind, value: f64, threshold: f64) -> bool {
        match kind {
            ConditionKind::GreaterThan | ConditionKind::ConsecutiveViolations => value > threshold,
            ConditionKind::LessThan => value < threshold,
            ConditionKind::Equals => (value - threshold).abs() <= self.epsilon,
            ConditionKind::ChangePercent => false,
        }
    }

    fn change_percent_met(
        &self,
        cond: &TriggerCondition,
        newest_first: &[&MetricObservation],
    ) -> bool {
        if newest_first.len() < 2 {
            return false;
        }
        let latest = newest_first[0].value;
        let previous = newest_first[1].value;
        if previous == 0.0 {
            // Undefined change; never fires, never errors.
            return false;
        }
        let change = ((latest - previous) / previous) * 100.0;

        match cond.threshold {
            Some(t) if t > 0.0 => change >= t,
            Some(t) if t < 0.0 => change <= t,
            // threshold zero or absent: any nonzero change fires.
            _ => change != 0.0,
        }
    }

    fn build_trigger(
        &self,
        rule: &Rule,
        relevant: &[&MetricObservation],
        now: DateTime<Utc>,
    ) -> ActionTrigger {
        let latest = relevant[0];
        let agent_type = rule
            .scope
            .agent_type
            .clone()
            .unwrap_or_else(|| latest.agent_type.clone());

        let params = ActionParams {
            agent_name: agent_type.clone(),
            agent_type,
            campaign_id: latest.campaign_id.clone(),
            metric_id: Some(latest.id),
            trigger_value: Some(latest.value),
            threshold: rule.condition.threshold,
            config: rule.action_params.clone(),
            metadata: ActionMetadata {
                rule_id: Some(rule.id),
                triggered_at: now,
                priority: rule.priority,
            },
        };

        let cooldown_until = rule
            .cooldown
            .and_then(|cd| chrono::Duration::from_std(cd).ok())
            .map(|cd| now + cd);

        ActionTrigger {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            action_type: rule.action_type.clone(),
            priority: rule.priority,
            params,
            metric_type: Some(latest.metric_type.clone()),
            metric_subtype: latest.metric_subtype.clone(),
            category: latest.category.clone(),
            cooldown_until,
            triggered_at: now,
        }
    }
}

fn scope_matches(rule: &Rule, obs: &MetricObservation) -> bool {
    let scope = &rule.scope;
    if let Some(ref agent) = scope.agent_type {
        if obs.agent_type != *agent {
            return false;
        }
    }
    if let Some(ref mt) = scope.metric_type {
        if obs.metric_type != *mt {
            return false;
        }
    }
    if let Some(ref sub) = scope.metric_subtype {
        if obs.metric_subtype.as_deref() != Some(sub.as_str()) {
            return false;
        }
    }
    if let Some(ref cat) = scope.category {
        if obs.category.as_deref() != Some(cat.as_str()) {
            return false;
        }
    }
    allow_list_matches(&scope.campaigns, obs.campaign_id.as_deref())
        && allow_list_matches(&scope.regions, obs.region.as_deref())
        && allow_list_matches(&scope.platforms, obs.platform.as_deref())
}

/// An empty allow-list matches everything; otherwise the tag must be present
/// and listed.
fn allow_list_matches(allowed: &[String], tag: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    tag.is_some_and(|t| allowed.iter().any(|a| a == t))
}
