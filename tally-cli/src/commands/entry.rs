//! Entry commands - inspect the audit trail of an account

use anyhow::Result;
use clap::Subcommand;
use tally_core::{Currency, Entry};

use super::{get_context, page_size};
use crate::output::{self, create_table, format_signed, format_time};

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Show one entry
    Show {
        /// Entry ID
        id: i64,
    },
    /// List entries of an account, oldest first
    List {
        /// Account ID
        account_id: i64,
        /// Page size (defaults to ledger.defaultPageSize)
        #[arg(long, short)]
        limit: Option<i64>,
        /// Number of entries to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

fn print_entries(entries: &[Entry], currency: Currency) {
    let mut table = create_table();
    table.set_header(vec!["ID", "Account", "Amount", "Time"]);
    for entry in entries {
        table.add_row(vec![
            entry.id.to_string(),
            entry.account_id.to_string(),
            format_signed(entry.amount, currency),
            format_time(&entry.created_at),
        ]);
    }
    println!("{table}");
}

pub fn run(command: EntryCommands, json: bool) -> Result<()> {
    let ctx = get_context()?;

    match command {
        EntryCommands::Show { id } => {
            let entry = ctx.transfer_service.get_entry(id)?;
            if json {
                return output::print_json(&entry);
            }
            let currency = ctx.account_service.get_account(entry.account_id)?.currency;
            print_entries(std::slice::from_ref(&entry), currency);
        }
        EntryCommands::List {
            account_id,
            limit,
            offset,
        } => {
            let entries =
                ctx.transfer_service
                    .list_entries(account_id, page_size(&ctx, limit), offset)?;
            if json {
                return output::print_json(&entries);
            }
            if entries.is_empty() {
                output::info("No entries found.");
                return Ok(());
            }
            let currency = ctx.account_service.get_account(account_id)?.currency;
            print_entries(&entries, currency);
        }
    }

    Ok(())
}
