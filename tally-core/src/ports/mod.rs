//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod store;

pub use store::{
    check_page, AddAccountBalanceParams, CancelToken, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, CreateVerifyEmailParams, ListAccountsParams,
    ListByAccountParams, Queries, Store, UpdateUserParams, UpdateVerifyEmailParams,
};
