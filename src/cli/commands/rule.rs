//! Rule management CLI commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{ActionPriority, Rule, RuleScope, TriggerCondition};
use crate::domain::ports::RuleStore;
use crate::services::builtin_rules;

#[derive(Args, Debug)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommands,
}

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// List all rules
    List {
        /// Only show enabled rules
        #[arg(long)]
        enabled_only: bool,
    },
    /// Show rule details
    Show {
        /// Rule ID or name
        id_or_name: String,
    },
    /// Enable a rule
    Enable {
        /// Rule ID or name
        id_or_name: String,
    },
    /// Disable a rule
    Disable {
        /// Rule ID or name
        id_or_name: String,
    },
    /// Delete a rule
    Delete {
        /// Rule ID or name
        id_or_name: String,
    },
    /// Seed the built-in starter rules (idempotent by name)
    Seed,
    /// Import rules from a YAML file
    Import {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct RuleOutput {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub priority: String,
    pub action_type: String,
    pub fire_count: u64,
    pub last_fired: Option<String>,
}

impl From<&Rule> for RuleOutput {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.to_string(),
            name: rule.name.clone(),
            description: truncate(&rule.description, 48),
            enabled: rule.enabled,
            priority: rule.priority.to_string(),
            action_type: rule.action_type.clone(),
            fire_count: rule.fire_count,
            last_fired: rule.last_fired.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RuleListOutput {
    pub rules: Vec<RuleOutput>,
    pub total: usize,
}

impl CommandOutput for RuleListOutput {
    fn to_human(&self) -> String {
        if self.rules.is_empty() {
            return "No rules found.".to_string();
        }

        let mut lines = vec![format!("Found {} rule(s):\n", self.total)];
        lines.push(format!(
            "{:<10} {:<28} {:<8} {:<10} {:<18} {:<6}",
            "ID", "NAME", "ENABLED", "PRIORITY", "ACTION", "FIRED"
        ));
        lines.push("-".repeat(84));
        for rule in &self.rules {
            lines.push(format!(
                "{:<10} {:<28} {:<8} {:<10} {:<18} {:<6}",
                &rule.id[..8],
                truncate(&rule.name, 26),
                if rule.enabled { "yes" } else { "no" },
                rule.priority,
                truncate(&rule.action_type, 16),
                rule.fire_count,
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RuleDetailOutput {
    #[serde(flatten)]
    pub rule: Rule,
}

impl CommandOutput for RuleDetailOutput {
    fn to_human(&self) -> String {
        let r = &self.rule;
        let mut lines = vec![
            format!("Rule:        {} ({})", r.name, r.id),
            format!("Description: {}", r.description),
            format!("Enabled:     {}", r.enabled),
            format!("Priority:    {}", r.priority),
            format!("Action:      {}", r.action_type),
            format!(
                "Condition:   {} threshold={:?} window={:?} consecutive={}",
                r.condition.kind.as_str(),
                r.condition.threshold,
                r.condition.window,
                r.condition.consecutive_count
            ),
            format!("Cooldown:    {:?}", r.cooldown),
            format!("Fired:       {} time(s)", r.fire_count),
        ];
        if let Some(last) = r.last_fired {
            lines.push(format!("Last fired:  {}", last.to_rfc3339()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MessageOutput {
    pub message: String,
}

impl CommandOutput for MessageOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

/// Rule shape accepted by `rule import` (YAML).
#[derive(Debug, Deserialize)]
struct RuleSpec {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    scope: RuleScope,
    condition: TriggerCondition,
    action_type: String,
    #[serde(default)]
    action_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    priority: ActionPriority,
    #[serde(default)]
    cooldown_secs: Option<u64>,
}

impl RuleSpec {
    fn into_rule(self) -> Result<Rule> {
        self.condition
            .validate()
            .map_err(|e| anyhow!("rule '{}': {e}", self.name))?;

        let mut rule = Rule::new(self.name, self.scope, self.condition, self.action_type)
            .with_description(self.description)
            .with_priority(self.priority);
        rule.action_params = self.action_params;
        rule.cooldown = self.cooldown_secs.map(Duration::from_secs);
        Ok(rule)
    }
}

async fn resolve_rule(ctx: &AppContext, id_or_name: &str) -> Result<Rule> {
    if let Ok(id) = Uuid::parse_str(id_or_name) {
        if let Some(rule) = ctx.rule_store.get(id).await? {
            return Ok(rule);
        }
    }
    ctx.rule_store
        .get_by_name(id_or_name)
        .await?
        .ok_or_else(|| anyhow!("No rule matching '{id_or_name}'"))
}

pub async fn execute(args: RuleArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        RuleCommands::List { enabled_only } => {
            let rules = if enabled_only {
                ctx.rule_store.list_active().await?
            } else {
                ctx.rule_store.list().await?
            };
            let out = RuleListOutput {
                total: rules.len(),
                rules: rules.iter().map(RuleOutput::from).collect(),
            };
            output(&out, json);
        }
        RuleCommands::Show { id_or_name } => {
            let rule = resolve_rule(&ctx, &id_or_name).await?;
            output(&RuleDetailOutput { rule }, json);
        }
        RuleCommands::Enable { id_or_name } => {
            let rule = resolve_rule(&ctx, &id_or_name).await?;
            ctx.rule_store.set_enabled(rule.id, true).await?;
            output(
                &MessageOutput {
                    message: format!("Rule '{}' enabled", rule.name),
                },
                json,
            );
        }
        RuleCommands::Disable { id_or_name } => {
            let rule = resolve_rule(&ctx, &id_or_name).await?;
            ctx.rule_store.set_enabled(rule.id, false).await?;
            output(
                &MessageOutput {
                    message: format!("Rule '{}' disabled", rule.name),
                },
                json,
            );
        }
        RuleCommands::Delete { id_or_name } => {
            let rule = resolve_rule(&ctx, &id_or_name).await?;
            ctx.rule_store.delete(rule.id).await?;
            output(
                &MessageOutput {
                    message: format!("Rule '{}' deleted", rule.name),
                },
                json,
            );
        }
        RuleCommands::Seed => {
            let mut created = 0;
            for rule in builtin_rules() {
                if ctx.rule_store.get_by_name(&rule.name).await?.is_none() {
                    ctx.rule_store.create(&rule).await?;
                    created += 1;
                }
            }
            output(
                &MessageOutput {
                    message: format!("Seeded {created} built-in rule(s)"),
                },
                json,
            );
        }
        RuleCommands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {file}"))?;
            let specs: Vec<RuleSpec> =
                serde_yaml::from_str(&raw).context("Failed to parse rule YAML")?;

            let mut created = 0;
            let mut skipped = 0;
            for spec in specs {
                let rule = spec.into_rule()?;
                if ctx.rule_store.get_by_name(&rule.name).await?.is_some() {
                    skipped += 1;
                    continue;
                }
                ctx.rule_store.create(&rule).await?;
                created += 1;
            }
            output(
                &MessageOutput {
                    message: format!(
                        "Imported {created} rule(s), skipped {skipped} existing"
                    ),
                },
                json,
            );
        }
    }

    Ok(())
}
