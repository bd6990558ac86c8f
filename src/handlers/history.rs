//! History command handler
//!
//! Prints the most recent recorded actions, newest first.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::AppConfig;
use crate::history::Outcome;

use super::open_store;

pub fn handle_history(limit: Option<usize>) -> Result<()> {
    let config = AppConfig::load()?;
    let store = open_store()?;
    let limit = limit.unwrap_or(config.history_limit);

    let records = store
        .recent_history(limit)
        .context("Failed to load history")?;
    if records.is_empty() {
        println!("{}", "No actions recorded yet.".yellow());
        return Ok(());
    }

    println!("{}", "Action History".cyan().bold());
    println!("{}", "=".repeat(80).cyan());

    for (idx, entry) in records.iter().enumerate() {
        let num = format!("{}.", idx + 1);
        let outcome = match entry.outcome {
            Outcome::Success => "OK".green(),
            Outcome::Failure => "FAILED".red(),
        };

        println!(
            "\n{} {} {}",
            num.bold(),
            entry.action.as_str().blue().bold(),
            outcome
        );
        println!(
            "   {} {}",
            "Time:".dimmed(),
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("   {} {}", "Target:".dimmed(), entry.target);
        if let Some(detail) = &entry.detail {
            println!("   {} {}", "Detail:".dimmed(), truncate(detail, 200));
        }
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "x".repeat(250);
        let cut = truncate(&long, 200);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
