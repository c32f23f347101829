//! Tally CLI - a double-entry ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_core::{ErrorKind, LogEvent, OperationResult};
use tracing::info_span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod output;

use commands::{account, entry, logs, status, transfer, user, verify};

/// Tally - a double-entry ledger in your terminal
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open, inspect, close and adjust accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Move money between accounts
    Transfer {
        #[command(subcommand)]
        command: transfer::TransferCommands,
    },

    /// Inspect ledger entries
    Entry {
        #[command(subcommand)]
        command: entry::EntryCommands,
    },

    /// Register and show users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Verify a user's email address
    Verify {
        #[command(subcommand)]
        command: verify::VerifyCommands,
    },

    /// Show ledger totals
    Status,

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Account { .. } => "account",
            Commands::Transfer { .. } => "transfer",
            Commands::Entry { .. } => "entry",
            Commands::User { .. } => "user",
            Commands::Verify { .. } => "verify",
            Commands::Status => "status",
            Commands::Logs { .. } => "logs",
        }
    }
}

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map a failure onto a process exit code by its core error kind
fn exit_code(error: &anyhow::Error) -> ExitCode {
    let kind = error
        .chain()
        .find_map(|e| e.downcast_ref::<tally_core::Error>())
        .map(|e| e.kind());
    match kind {
        Some(ErrorKind::NotFound) => ExitCode::from(2),
        Some(ErrorKind::ConstraintViolation) => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let json = cli.json;
    let command = cli.command.name();
    // The event log does not record its own maintenance.
    let logger = match cli.command {
        Commands::Logs { .. } => None,
        _ => commands::get_logger(),
    };

    let operation_id = Uuid::new_v4().to_string();
    let span = info_span!("command", command, operation_id = %operation_id);
    let _enter = span.enter();

    let event = |name: &str| {
        LogEvent::new(name)
            .with_command(command)
            .with_operation_id(&operation_id)
    };

    match run(cli) {
        Ok(()) => {
            commands::log_event(&logger, event("command_executed"));
            ExitCode::SUCCESS
        }
        Err(e) => {
            let core = e.chain().find_map(|c| c.downcast_ref::<tally_core::Error>());
            let failed = match core {
                Some(core) => event("command_failed").with_error(core),
                None => event("command_failed").with_error_message(format!("{e:#}")),
            };
            commands::log_event(&logger, failed);

            if json {
                let mut result = OperationResult::<()>::fail(format!("{e:#}"));
                result.error_kind = core.map(|c| c.kind());
                if let Ok(body) = serde_json::to_string_pretty(&result) {
                    println!("{body}");
                }
            } else {
                output::error(&format!("Error: {e:#}"));
            }
            exit_code(&e)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Account { command } => account::run(command, json),
        Commands::Transfer { command } => transfer::run(command, json),
        Commands::Entry { command } => entry::run(command, json),
        Commands::User { command } => user::run(command, json),
        Commands::Verify { command } => verify::run(command, json),
        Commands::Status => status::run(json),
        Commands::Logs { command } => logs::run(command, json),
    }
}
