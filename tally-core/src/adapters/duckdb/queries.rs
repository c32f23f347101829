//! Ledger SQL, shared by autocommit calls and transaction scopes

use chrono::{DateTime, Utc};
use duckdb::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, Value, ValueRef};
use duckdb::{params, Connection, OptionalExt, Row};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Currency, Entry, Transfer, User, VerifyEmail};
use crate::ports::{
    AddAccountBalanceParams, CancelToken, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, CreateVerifyEmailParams, ListAccountsParams,
    ListByAccountParams, Queries, UpdateUserParams, UpdateVerifyEmailParams,
};

macro_rules! account_columns {
    () => {
        "id, owner, balance, currency, created_at"
    };
}

macro_rules! entry_columns {
    () => {
        "id, account_id, amount, created_at"
    };
}

macro_rules! transfer_columns {
    () => {
        "id, from_account_id, to_account_id, amount, created_at"
    };
}

macro_rules! user_columns {
    () => {
        "username, full_name, email, is_email_verified, created_at"
    };
}

macro_rules! verify_email_columns {
    () => {
        "id, username, email, secret_code, is_used, created_at, expired_at"
    };
}

impl FromSql for Currency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = String::column_result(value)?;
        code.parse::<Currency>()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Currency {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Text(self.code().to_string())))
    }
}

/// Map a DuckDB failure onto the core error type.
/// Unique/check constraint failures are caller errors, everything else is storage.
pub(crate) fn db_err(e: duckdb::Error) -> Error {
    let msg = e.to_string();
    if msg.contains("Constraint Error") {
        Error::ConstraintViolation(msg)
    } else {
        Error::Database(msg)
    }
}

/// Turn "no row" into `NotFound`
fn required<T>(row: duckdb::Result<T>, what: impl FnOnce() -> String) -> Result<T> {
    row.optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::not_found(what()))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn timestamp(row: &Row<'_>, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_account(row: &Row<'_>) -> duckdb::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn row_to_entry(row: &Row<'_>) -> duckdb::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

fn row_to_transfer(row: &Row<'_>) -> duckdb::Result<Transfer> {
    Ok(Transfer {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn row_to_user(row: &Row<'_>) -> duckdb::Result<User> {
    Ok(User {
        username: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        is_email_verified: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn row_to_verify_email(row: &Row<'_>) -> duckdb::Result<VerifyEmail> {
    Ok(VerifyEmail {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        secret_code: row.get(3)?,
        is_used: row.get(4)?,
        created_at: timestamp(row, 5)?,
        expired_at: timestamp(row, 6)?,
    })
}

/// [`Queries`] over a borrowed connection.
///
/// Inside [`Store::execute`](crate::ports::Store::execute) the connection is
/// the open transaction and `cancel` is the caller's token; every statement
/// checks the token first.
pub struct DuckDbQueries<'a> {
    conn: &'a Connection,
    cancel: Option<&'a CancelToken>,
}

impl<'a> DuckDbQueries<'a> {
    pub(crate) fn new(conn: &'a Connection, cancel: Option<&'a CancelToken>) -> Self {
        Self { conn, cancel }
    }

    fn conn(&self) -> Result<&'a Connection> {
        if let Some(cancel) = self.cancel {
            cancel.check()?;
        }
        Ok(self.conn)
    }

    fn select_account(&self, id: i64) -> Result<Account> {
        required(
            self.conn()?.query_row(
                concat!("SELECT ", account_columns!(), " FROM accounts WHERE id = ?"),
                [id],
                row_to_account,
            ),
            || format!("account {id}"),
        )
    }
}

impl Queries for DuckDbQueries<'_> {
    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        self.conn()?
            .query_row(
                concat!(
                    "INSERT INTO accounts (owner, balance, currency, created_at) VALUES (?, ?, ?, ?) RETURNING ",
                    account_columns!()
                ),
                params![params.owner, params.balance, params.currency, now()],
                row_to_account,
            )
            .map_err(db_err)
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        self.select_account(id)
    }

    fn get_account_for_update(&self, id: i64) -> Result<Account> {
        // DuckDB has no SELECT ... FOR UPDATE. A transaction owns the
        // repository connection until it ends, which already excludes
        // every other writer.
        self.select_account(id)
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        required(
            self.conn()?.query_row(
                concat!(
                    "UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING ",
                    account_columns!()
                ),
                params![params.amount, params.id],
                row_to_account,
            ),
            || format!("account {}", params.id),
        )
    }

    fn list_accounts(&self, params: &ListAccountsParams) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let accounts = match &params.owner {
            Some(owner) => {
                let mut stmt = conn
                    .prepare(concat!(
                        "SELECT ", account_columns!(),
                        " FROM accounts WHERE owner = ? ORDER BY id LIMIT ? OFFSET ?"
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![owner, params.limit, params.offset], row_to_account)
                    .map_err(db_err)?;
                rows.collect::<duckdb::Result<Vec<_>>>()
            }
            None => {
                let mut stmt = conn
                    .prepare(concat!(
                        "SELECT ", account_columns!(),
                        " FROM accounts ORDER BY id LIMIT ? OFFSET ?"
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![params.limit, params.offset], row_to_account)
                    .map_err(db_err)?;
                rows.collect::<duckdb::Result<Vec<_>>>()
            }
        };
        accounts.map_err(db_err)
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM accounts WHERE id = ?", [id])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(Error::not_found(format!("account {id}")));
        }
        Ok(())
    }

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.conn()?
            .query_row(
                concat!(
                    "INSERT INTO entries (account_id, amount, created_at) VALUES (?, ?, ?) RETURNING ",
                    entry_columns!()
                ),
                params![params.account_id, params.amount, now()],
                row_to_entry,
            )
            .map_err(db_err)
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        required(
            self.conn()?.query_row(
                concat!("SELECT ", entry_columns!(), " FROM entries WHERE id = ?"),
                [id],
                row_to_entry,
            ),
            || format!("entry {id}"),
        )
    }

    fn list_entries(&self, params: &ListByAccountParams) -> Result<Vec<Entry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(concat!(
                "SELECT ", entry_columns!(),
                " FROM entries WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![params.account_id, params.limit, params.offset],
                row_to_entry,
            )
            .map_err(db_err)?;
        rows.collect::<duckdb::Result<Vec<_>>>().map_err(db_err)
    }

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        self.conn()?
            .query_row(
                concat!(
                    "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at) VALUES (?, ?, ?, ?) RETURNING ",
                    transfer_columns!()
                ),
                params![
                    params.from_account_id,
                    params.to_account_id,
                    params.amount,
                    now()
                ],
                row_to_transfer,
            )
            .map_err(db_err)
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        required(
            self.conn()?.query_row(
                concat!("SELECT ", transfer_columns!(), " FROM transfers WHERE id = ?"),
                [id],
                row_to_transfer,
            ),
            || format!("transfer {id}"),
        )
    }

    fn list_transfers(&self, params: &ListByAccountParams) -> Result<Vec<Transfer>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(concat!(
                "SELECT ", transfer_columns!(),
                " FROM transfers WHERE from_account_id = ? OR to_account_id = ?",
                " ORDER BY id LIMIT ? OFFSET ?"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![
                    params.account_id,
                    params.account_id,
                    params.limit,
                    params.offset
                ],
                row_to_transfer,
            )
            .map_err(db_err)?;
        rows.collect::<duckdb::Result<Vec<_>>>().map_err(db_err)
    }

    fn create_user(&self, params: &CreateUserParams) -> Result<User> {
        self.conn()?
            .query_row(
                concat!(
                    "INSERT INTO users (username, full_name, email, created_at) VALUES (?, ?, ?, ?) RETURNING ",
                    user_columns!()
                ),
                params![params.username, params.full_name, params.email, now()],
                row_to_user,
            )
            .map_err(db_err)
    }

    fn get_user(&self, username: &str) -> Result<User> {
        required(
            self.conn()?.query_row(
                concat!("SELECT ", user_columns!(), " FROM users WHERE username = ?"),
                [username],
                row_to_user,
            ),
            || format!("user {username}"),
        )
    }

    fn update_user(&self, params: &UpdateUserParams) -> Result<User> {
        // username and email carry indexes; only unindexed columns are
        // updated so DuckDB can change the row in place.
        required(
            self.conn()?.query_row(
                concat!(
                    "UPDATE users SET full_name = COALESCE(?, full_name), ",
                    "is_email_verified = COALESCE(?, is_email_verified) ",
                    "WHERE username = ? RETURNING ",
                    user_columns!()
                ),
                params![params.full_name, params.is_email_verified, params.username],
                row_to_user,
            ),
            || format!("user {}", params.username),
        )
    }

    fn create_verify_email(&self, params: &CreateVerifyEmailParams) -> Result<VerifyEmail> {
        let created_at = Utc::now();
        let expired_at = created_at + params.ttl;
        self.conn()?
            .query_row(
                concat!(
                    "INSERT INTO verify_emails (username, email, secret_code, created_at, expired_at) ",
                    "VALUES (?, ?, ?, ?, ?) RETURNING ",
                    verify_email_columns!()
                ),
                params![
                    params.username,
                    params.email,
                    params.secret_code,
                    created_at.to_rfc3339(),
                    expired_at.to_rfc3339()
                ],
                row_to_verify_email,
            )
            .map_err(db_err)
    }

    fn get_verify_email(&self, id: i64) -> Result<VerifyEmail> {
        required(
            self.conn()?.query_row(
                concat!("SELECT ", verify_email_columns!(), " FROM verify_emails WHERE id = ?"),
                [id],
                row_to_verify_email,
            ),
            || format!("verify email {id}"),
        )
    }

    fn update_verify_email(&self, params: &UpdateVerifyEmailParams) -> Result<VerifyEmail> {
        required(
            self.conn()?.query_row(
                concat!(
                    "UPDATE verify_emails SET is_used = ? WHERE id = ? RETURNING ",
                    verify_email_columns!()
                ),
                params![params.is_used, params.id],
                row_to_verify_email,
            ),
            || format!("verify email {}", params.id),
        )
    }
}
