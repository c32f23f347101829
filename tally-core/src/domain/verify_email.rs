//! Email verification record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// A one-time code sent to a user's email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEmail {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl VerifyEmail {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expired_at
    }
}

/// Both rows touched by a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEmailResult {
    pub user: User,
    pub verify_email: VerifyEmail,
}
