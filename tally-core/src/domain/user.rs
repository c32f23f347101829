//! User domain model

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_]{3,100}$").expect("valid regex"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
    })
}

/// A registered user whose email address may or may not be verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Validate the fields a caller supplies when registering
    pub fn validate_new(username: &str, full_name: &str, email: &str) -> Result<()> {
        if !username_pattern().is_match(username) {
            return Err(Error::constraint(
                "username must be 3-100 lowercase letters, digits or underscores",
            ));
        }
        if full_name.trim().is_empty() {
            return Err(Error::constraint("full name cannot be empty"));
        }
        if !email_pattern().is_match(email) {
            return Err(Error::constraint(format!("invalid email address: {email}")));
        }
        Ok(())
    }
}
