//! User commands - register and show users

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tally_core::User;

use super::get_context;
use crate::output::{self, create_table, format_time};

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    New {
        /// Username (lowercase letters, digits, underscores)
        username: String,
        /// Full name
        #[arg(long)]
        full_name: String,
        /// Email address
        #[arg(long)]
        email: String,
    },
    /// Show one user
    Show {
        /// Username
        username: String,
    },
}

fn print_user(user: &User) {
    let verified = if user.is_email_verified {
        "yes".green().to_string()
    } else {
        "no".yellow().to_string()
    };

    let mut table = create_table();
    table.add_row(vec!["Username".to_string(), user.username.clone()]);
    table.add_row(vec!["Full name".to_string(), user.full_name.clone()]);
    table.add_row(vec!["Email".to_string(), user.email.clone()]);
    table.add_row(vec!["Verified".to_string(), verified]);
    table.add_row(vec!["Created".to_string(), format_time(&user.created_at)]);
    println!("{table}");
}

pub fn run(command: UserCommands, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.verification_service;

    match command {
        UserCommands::New {
            username,
            full_name,
            email,
        } => {
            let user = service.create_user(&username, &full_name, &email)?;
            if json {
                return output::print_json(&user);
            }
            output::success(&format!("Registered user {}", user.username));
            println!("Run `tally verify request {}` to verify {}", user.username, user.email);
        }
        UserCommands::Show { username } => {
            let user = service.get_user(&username)?;
            if json {
                return output::print_json(&user);
            }
            print_user(&user);
        }
    }

    Ok(())
}
