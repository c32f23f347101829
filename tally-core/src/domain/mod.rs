//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod entry;
mod transfer;
mod user;
mod verify_email;
pub mod result;

pub use account::{Account, Currency};
pub use entry::Entry;
pub use transfer::{Transfer, TransferParams, TransferResult};
pub use user::User;
pub use verify_email::{VerifyEmail, VerifyEmailResult};
