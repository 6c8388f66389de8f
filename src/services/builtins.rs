//! Built-in starter rules, seeded on demand via the CLI.

use std::time::Duration;

use crate::domain::models::{ActionPriority, ConditionKind, Rule, RuleScope, TriggerCondition};

/// The default rule set for a fresh deployment. Seeding is idempotent by
/// rule name; existing rules are left untouched.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        // cpc-spike-pause: a single CPC observation over threshold pauses the campaign
        Rule::new(
            "cpc-spike-pause",
            RuleScope::for_metric("ppc", "cost_per_click"),
            TriggerCondition::new(ConditionKind::GreaterThan, Some(5.0))
                .with_window(Duration::from_secs(3600)),
            "pause_campaign",
        )
        .with_description("Pause a campaign when cost per click spikes above $5")
        .with_priority(ActionPriority::High)
        .with_cooldown(Duration::from_secs(3600))
        .with_param("reason", serde_json::json!("cpc spike")),

        // roas-collapse-budget: three consecutive ROAS readings below break-even
        Rule::new(
            "roas-collapse-budget",
            RuleScope::for_metric("ppc", "roas"),
            TriggerCondition::new(ConditionKind::LessThan, Some(1.0))
                .with_window(Duration::from_secs(6 * 3600))
                .with_consecutive_count(3),
            "adjust_budget",
        )
        .with_description("Cut budget after ROAS stays below break-even for three readings")
        .with_priority(ActionPriority::Critical)
        .with_cooldown(Duration::from_secs(2 * 3600))
        .with_param("adjustment_percent", serde_json::json!(-30)),

        // spend-surge-notify: spend jumped more than 50% between readings
        Rule::new(
            "spend-surge-notify",
            RuleScope::for_metric("ppc", "spend"),
            TriggerCondition::new(ConditionKind::ChangePercent, Some(50.0))
                .with_window(Duration::from_secs(2 * 3600)),
            "notify_team",
        )
        .with_description("Notify the team when spend surges more than 50% between readings")
        .with_priority(ActionPriority::Medium)
        .with_cooldown(Duration::from_secs(1800)),

        // zero-conversions-pause: five consecutive readings with no conversions
        Rule::new(
            "zero-conversions-pause",
            RuleScope::for_metric("ppc", "conversions"),
            TriggerCondition::new(ConditionKind::Equals, Some(0.0))
                .with_window(Duration::from_secs(12 * 3600))
                .with_consecutive_count(5),
            "pause_campaign",
        )
        .with_description("Pause a campaign that stops converting entirely")
        .with_priority(ActionPriority::Emergency)
        .with_cooldown(Duration::from_secs(6 * 3600))
        .with_param("reason", serde_json::json!("no conversions")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_are_well_formed() {
        let rules = builtin_rules();
        assert_eq!(rules.len(), 4);
        for rule in &rules {
            assert!(rule.enabled);
            assert!(rule.condition.validate().is_ok(), "rule {} invalid", rule.name);
            assert!(rule.cooldown.is_some());
        }
    }
}
