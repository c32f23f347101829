//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::Currency;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Pretty-print any serializable value as JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Minor units as a decimal amount with its currency code, e.g. `-12.50 USD`
pub fn format_amount(minor_units: i64, currency: Currency) -> String {
    format!("{} {}", Decimal::new(minor_units, 2), currency)
}

/// Signed amount, colored by direction
pub fn format_signed(minor_units: i64, currency: Currency) -> String {
    let text = format_amount(minor_units, currency);
    if minor_units < 0 {
        text.red().to_string()
    } else {
        format!("+{text}").green().to_string()
    }
}

/// Timestamp in local time, to the second
pub fn format_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
