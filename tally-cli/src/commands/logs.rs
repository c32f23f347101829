//! Logs command - view and manage the event log

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use tally_core::{EntryPoint, LoggingService};

use super::get_tally_dir;
use crate::output::{self, create_table};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: i64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Show log statistics and database path
    Stats,
}

fn get_logging_service() -> Result<LoggingService> {
    let tally_dir = get_tally_dir()?;
    std::fs::create_dir_all(&tally_dir)?;
    LoggingService::new(&tally_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands, json: bool) -> Result<()> {
    let service = get_logging_service()?;

    match command {
        LogsCommands::List { limit, errors } => {
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                return output::print_json(&entries);
            }

            if entries.is_empty() {
                output::info("No log entries found.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Time", "Event", "Command", "Error"]);

            for entry in &entries {
                let error = match (&entry.error_kind, &entry.error_message) {
                    (Some(kind), _) => kind.red().to_string(),
                    (None, Some(_)) => "!".red().to_string(),
                    (None, None) => String::new(),
                };
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.event.clone(),
                    entry.command.clone().unwrap_or_default(),
                    error,
                ]);
            }

            println!("{table}");

            if !errors {
                let recent_errors: Vec<_> = entries
                    .iter()
                    .filter(|e| e.error_message.is_some())
                    .take(3)
                    .collect();
                if !recent_errors.is_empty() {
                    println!();
                    println!("{}", "Recent Errors:".red().bold());
                    for err in recent_errors {
                        println!(
                            "  {} [{}]: {}",
                            format_timestamp(err.timestamp).dimmed(),
                            err.command.as_deref().unwrap_or(&err.event),
                            err.error_message.as_deref().unwrap_or("Unknown error")
                        );
                    }
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
        } => {
            let cutoff_ms = (Utc::now() - Duration::days(older_than_days)).timestamp_millis();

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete logs older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = service.delete_before(cutoff_ms)?;

            if json {
                return output::print_json(&serde_json::json!({ "deleted": deleted }));
            }
            println!("Deleted {} log entries", deleted);
        }
        LogsCommands::Stats => {
            let total = service.count()?;
            let by_kind = service.error_counts()?;
            let errors: u64 = by_kind.iter().map(|(_, n)| n).sum();
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                let by_kind: serde_json::Map<_, _> = by_kind
                    .into_iter()
                    .map(|(kind, n)| (kind, serde_json::json!(n)))
                    .collect();
                return output::print_json(&serde_json::json!({
                    "total_entries": total,
                    "error_count": errors,
                    "errors_by_kind": by_kind,
                    "database_path": db_path.to_string_lossy(),
                    "database_size_bytes": size_bytes
                }));
            }

            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", total);
            println!("  Errors: {}", errors);
            for (kind, n) in &by_kind {
                println!("    {}: {}", kind, n);
            }
            println!("  Database: {}", db_path.display());
            println!("  Size: {} bytes", size_bytes);
        }
    }

    Ok(())
}
