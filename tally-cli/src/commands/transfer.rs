//! Transfer commands - send money and inspect transfers

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tally_core::{Currency, Transfer};

use super::{get_context, page_size};
use crate::output::{self, create_table, format_amount, format_signed, format_time};

#[derive(Subcommand)]
pub enum TransferCommands {
    /// Move money from one account to another
    Send {
        /// Source account ID
        from: i64,
        /// Destination account ID
        to: i64,
        /// Amount in minor units (cents)
        amount: i64,
    },
    /// Show one transfer
    Show {
        /// Transfer ID
        id: i64,
    },
    /// List transfers into or out of an account
    List {
        /// Account ID
        account_id: i64,
        /// Page size (defaults to ledger.defaultPageSize)
        #[arg(long, short)]
        limit: Option<i64>,
        /// Number of transfers to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

/// Transfer rows as seen from `account_id`: outgoing amounts are negative
fn print_transfers(transfers: &[Transfer], account_id: Option<i64>, currency: Currency) {
    let mut table = create_table();
    table.set_header(vec!["ID", "From", "To", "Amount", "Time"]);
    for transfer in transfers {
        let amount = match account_id {
            Some(id) if id == transfer.from_account_id => {
                format_signed(-transfer.amount, currency)
            }
            Some(_) => format_signed(transfer.amount, currency),
            None => format_amount(transfer.amount, currency),
        };
        table.add_row(vec![
            transfer.id.to_string(),
            transfer.from_account_id.to_string(),
            transfer.to_account_id.to_string(),
            amount,
            format_time(&transfer.created_at),
        ]);
    }
    println!("{table}");
}

pub fn run(command: TransferCommands, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.transfer_service;

    match command {
        TransferCommands::Send { from, to, amount } => {
            let result = service.transfer_funds(from, to, amount)?;
            if json {
                return output::print_json(&result);
            }

            let currency = result.from_account.currency;
            println!(
                "{} Transfer {}: {} from account {} to account {}",
                "✓".green(),
                result.transfer.id,
                format_amount(result.transfer.amount, currency).bold(),
                from,
                to
            );
            println!(
                "  Account {}: {}",
                result.from_account.id,
                format_amount(result.from_account.balance, currency)
            );
            println!(
                "  Account {}: {}",
                result.to_account.id,
                format_amount(result.to_account.balance, result.to_account.currency)
            );
        }
        TransferCommands::Show { id } => {
            let transfer = service.get_transfer(id)?;
            if json {
                return output::print_json(&transfer);
            }
            let currency = ctx
                .account_service
                .get_account(transfer.from_account_id)
                .map(|a| a.currency)?;
            print_transfers(std::slice::from_ref(&transfer), None, currency);
        }
        TransferCommands::List {
            account_id,
            limit,
            offset,
        } => {
            let transfers = service.list_transfers(account_id, page_size(&ctx, limit), offset)?;
            if json {
                return output::print_json(&transfers);
            }
            if transfers.is_empty() {
                output::info("No transfers found.");
                return Ok(());
            }
            let currency = ctx.account_service.get_account(account_id)?.currency;
            print_transfers(&transfers, Some(account_id), currency);
        }
    }

    Ok(())
}
