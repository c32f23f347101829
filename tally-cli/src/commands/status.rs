//! Status command - ledger totals

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output::{self, create_table, format_amount};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        return output::print_json(&status);
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = create_table();
    table.add_row(vec!["Accounts".to_string(), status.total_accounts.to_string()]);
    table.add_row(vec!["Transfers".to_string(), status.total_transfers.to_string()]);
    table.add_row(vec!["Entries".to_string(), status.total_entries.to_string()]);
    println!("{table}");

    if !status.balances.is_empty() {
        println!();
        println!("{}", "Balances by Currency".bold());
        for total in &status.balances {
            println!("  {}", format_amount(total.total, total.currency));
        }
    }

    Ok(())
}
