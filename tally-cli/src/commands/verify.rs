//! Verify commands - issue and confirm email verification codes

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output::{self, format_time};

#[derive(Subcommand)]
pub enum VerifyCommands {
    /// Issue a verification code for a user's email
    Request {
        /// Username
        username: String,
    },
    /// Confirm a verification code
    Confirm {
        /// Verification record ID
        email_id: i64,
        /// Secret code
        secret_code: String,
    },
}

pub fn run(command: VerifyCommands, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.verification_service;

    match command {
        VerifyCommands::Request { username } => {
            let record = service.request_verification(&username)?;
            if json {
                return output::print_json(&record);
            }
            // No mail transport: the code is handed to the operator.
            println!("{}", "Verification code issued".bold());
            println!("  Email:   {}", record.email);
            println!("  ID:      {}", record.id);
            println!("  Code:    {}", record.secret_code);
            println!("  Expires: {}", format_time(&record.expired_at));
            println!();
            println!("Confirm with `tally verify confirm {} <code>`", record.id);
        }
        VerifyCommands::Confirm {
            email_id,
            secret_code,
        } => {
            let result = service.verify_email(email_id, secret_code.trim())?;
            if json {
                return output::print_json(&result);
            }
            output::success(&format!(
                "Verified {} for {}",
                result.verify_email.email, result.user.username
            ));
        }
    }

    Ok(())
}
