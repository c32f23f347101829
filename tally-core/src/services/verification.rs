//! Verification service - users and email verification
//!
//! Confirming a code marks the code used and the user verified in one
//! transaction, through the same executor transfers use.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{User, VerifyEmail, VerifyEmailResult};
use crate::ports::{
    CreateUserParams, CreateVerifyEmailParams, Queries, Store, UpdateUserParams,
    UpdateVerifyEmailParams,
};

const SECRET_CODE_LEN: usize = 32;
const SECRET_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

fn random_secret_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_CODE_LEN)
        .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
        .collect()
}

/// The verification unit of work, run against an open transaction.
///
/// `now` is the instant the code is checked against its expiry.
pub fn verify_email_tx(
    q: &dyn Queries,
    email_id: i64,
    secret_code: &str,
    now: DateTime<Utc>,
) -> Result<VerifyEmailResult> {
    let record = q.get_verify_email(email_id)?;
    if record.secret_code != secret_code {
        return Err(Error::constraint("invalid secret code"));
    }
    if record.is_used {
        return Err(Error::constraint("verification code already used"));
    }
    if record.is_expired_at(now) {
        return Err(Error::constraint("verification code expired"));
    }

    let verify_email = q.update_verify_email(&UpdateVerifyEmailParams {
        id: email_id,
        is_used: true,
    })?;
    let user = q.update_user(&UpdateUserParams {
        username: verify_email.username.clone(),
        is_email_verified: Some(true),
        ..Default::default()
    })?;

    Ok(VerifyEmailResult { user, verify_email })
}

pub struct VerificationService<S: Store = DuckDbRepository> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: Store> VerificationService<S> {
    pub fn new(store: Arc<S>, ttl_minutes: i64) -> Self {
        Self {
            store,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn create_user(&self, username: &str, full_name: &str, email: &str) -> Result<User> {
        User::validate_new(username, full_name, email)?;
        self.store.create_user(&CreateUserParams {
            username: username.to_string(),
            full_name: full_name.trim().to_string(),
            email: email.to_string(),
        })
    }

    pub fn get_user(&self, username: &str) -> Result<User> {
        self.store.get_user(username)
    }

    /// Issue a new code for the user's current email address
    pub fn request_verification(&self, username: &str) -> Result<VerifyEmail> {
        let record = self.store.execute(|q| {
            let user = q.get_user(username)?;
            if user.is_email_verified {
                return Err(Error::constraint(format!(
                    "email of {username} is already verified"
                )));
            }
            q.create_verify_email(&CreateVerifyEmailParams {
                username: user.username,
                email: user.email,
                secret_code: random_secret_code(),
                ttl: self.ttl,
            })
        })?;
        debug!(email_id = record.id, "verification code issued");
        Ok(record)
    }

    pub fn get_verification(&self, email_id: i64) -> Result<VerifyEmail> {
        self.store.get_verify_email(email_id)
    }

    /// Confirm a code: mark it used and flag the user verified, atomically
    pub fn verify_email(&self, email_id: i64, secret_code: &str) -> Result<VerifyEmailResult> {
        let result = self
            .store
            .execute(|q| verify_email_tx(q, email_id, secret_code, Utc::now()))?;
        info!(email_id, "email verified");
        Ok(result)
    }
}
