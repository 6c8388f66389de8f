//! CLI output helpers: human tables or JSON, selected by `--json`.

use serde::Serialize;

/// Anything a command can print.
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
}

/// Print a command result in the selected mode.
pub fn output<T: CommandOutput>(value: &T, json: bool) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to serialize output: {e}"),
        }
    } else {
        println!("{}", value.to_human());
    }
}

/// Truncate a string for table display.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Print an error and exit nonzero.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_preserves_short_strings() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-much-longer-string", 10), "a-much-lo…");
    }
}
