//! Manual action triggering, bypassing the evaluator.

use anyhow::{anyhow, Result};
use clap::Args;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::ExecutionRecord;

#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Agent type to act for (e.g. ppc, email)
    pub agent_type: String,
    /// Action type to execute (must be registered)
    pub action_type: String,
    /// Optional campaign id
    #[arg(long)]
    pub campaign: Option<String>,
    /// Executor config entries, `key=value` (values parsed as JSON when possible)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct TriggerOutput {
    pub record: ExecutionRecord,
}

impl CommandOutput for TriggerOutput {
    fn to_human(&self) -> String {
        let r = &self.record;
        let verdict = if r.result.success {
            console::style("succeeded").green().to_string()
        } else {
            console::style("failed").red().to_string()
        };
        let mut lines = vec![
            format!(
                "Action {} {} after {} attempt(s)",
                r.action_type, verdict, r.attempts
            ),
            format!("Record:  {}", r.id),
            format!("Message: {}", r.result.message),
        ];
        if let Some(ref error) = r.result.error {
            lines.push(format!("Error:   {error}"));
        }
        lines.join("\n")
    }
}

fn parse_params(raw: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --param '{entry}', expected KEY=VALUE"))?;
        let parsed = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.to_string(), parsed);
    }
    Ok(map)
}

pub async fn execute(args: TriggerArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let config = parse_params(&args.params)?;

    let record = ctx
        .scheduler
        .trigger_action(&args.agent_type, &args.action_type, config, args.campaign)
        .await?;

    output(&TriggerOutput { record }, json);
    Ok(())
}
