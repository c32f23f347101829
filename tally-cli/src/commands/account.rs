//! Account commands - open, show, list, close and adjust accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use tally_core::Account;

use super::{get_context, page_size};
use crate::output::{self, create_table, format_amount, format_signed, format_time};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Owner name
        owner: String,
        /// Currency code (USD, EUR, UAH)
        #[arg(long, short, default_value = "USD")]
        currency: String,
        /// Opening balance in minor units (cents)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        balance: i64,
    },
    /// Show one account
    Show {
        /// Account ID
        id: i64,
    },
    /// List accounts ordered by ID
    List {
        /// Only accounts of this owner
        #[arg(long)]
        owner: Option<String>,
        /// Page size (defaults to ledger.defaultPageSize)
        #[arg(long, short)]
        limit: Option<i64>,
        /// Number of accounts to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Delete an account that has no entries
    Close {
        /// Account ID
        id: i64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Credit or debit an account outside a transfer
    Adjust {
        /// Account ID
        id: i64,
        /// Signed amount in minor units (cents)
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
}

fn print_accounts(accounts: &[Account]) {
    let mut table = create_table();
    table.set_header(vec!["ID", "Owner", "Balance", "Opened"]);
    for account in accounts {
        table.add_row(vec![
            account.id.to_string(),
            account.owner.clone(),
            format_amount(account.balance, account.currency),
            format_time(&account.created_at),
        ]);
    }
    println!("{table}");
}

pub fn run(command: AccountCommands, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.account_service;

    match command {
        AccountCommands::Open {
            owner,
            currency,
            balance,
        } => {
            let account = service.create_account(&owner, balance, &currency)?;
            if json {
                return output::print_json(&account);
            }
            output::success(&format!(
                "Opened account {} for {} with {}",
                account.id,
                account.owner,
                format_amount(account.balance, account.currency)
            ));
        }
        AccountCommands::Show { id } => {
            let account = service.get_account(id)?;
            if json {
                return output::print_json(&account);
            }
            print_accounts(std::slice::from_ref(&account));
        }
        AccountCommands::List {
            owner,
            limit,
            offset,
        } => {
            let accounts = service.list_accounts(owner.as_deref(), page_size(&ctx, limit), offset)?;
            if json {
                return output::print_json(&accounts);
            }
            if accounts.is_empty() {
                output::info("No accounts found.");
                return Ok(());
            }
            print_accounts(&accounts);
        }
        AccountCommands::Close { id, force } => {
            let account = service.get_account(id)?;
            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Close account {} ({})?", account.id, account.owner))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            service.delete_account(id)?;
            if json {
                return output::print_json(&serde_json::json!({ "deleted": id }));
            }
            output::success(&format!("Closed account {id}"));
        }
        AccountCommands::Adjust { id, amount } => {
            let result = service.adjust_balance(id, amount)?;
            if json {
                return output::print_json(&result);
            }
            println!(
                "{} Entry {}: {}",
                "✓".green(),
                result.entry.id,
                format_signed(result.entry.amount, result.account.currency)
            );
            println!(
                "  New balance: {}",
                format_amount(result.account.balance, result.account.currency).bold()
            );
        }
    }

    Ok(())
}
