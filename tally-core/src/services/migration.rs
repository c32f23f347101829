//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each applied migration
//! is recorded in `sys_migrations`; a migration and its record are written in
//! the same transaction, so a failed migration leaves no trace.

use std::collections::HashSet;

use anyhow::{Context, Result};
use duckdb::Connection;

use crate::migrations::MIGRATIONS;

const BOOTSTRAP: &str = "000_migrations.sql";

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Applies an ordered list of embedded migrations to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [(&'static str, &'static str)],
}

impl<'a> MigrationService<'a> {
    /// Migration service for the ledger database
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_migrations(conn, MIGRATIONS)
    }

    /// Migration service for any other embedded migration list
    pub fn with_migrations(
        conn: &'a Connection,
        migrations: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations in order
    pub fn run_pending(&self) -> Result<MigrationResult> {
        // The bootstrap migration only uses IF NOT EXISTS, so it is safe to
        // run before we can tell whether it was recorded.
        if let Some((_, sql)) = self.migrations.iter().find(|(n, _)| *n == BOOTSTRAP) {
            self.conn
                .execute_batch(sql)
                .context("failed to create sys_migrations")?;
        }

        let applied: HashSet<String> = self.get_applied()?.into_iter().collect();
        let mut newly_applied = Vec::new();

        for (name, sql) in self.migrations {
            if applied.contains(*name) {
                continue;
            }
            self.apply(name, sql)
                .with_context(|| format!("migration {name} failed"))?;
            newly_applied.push(name.to_string());
        }

        Ok(MigrationResult {
            already_applied: self.migrations.len() - newly_applied.len(),
            applied: newly_applied,
        })
    }

    /// Names of migrations already recorded, sorted
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Names of migrations not yet recorded, in application order
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied: HashSet<String> = self.get_applied()?.into_iter().collect();
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.contains(*name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;

        let outcome = self.conn.execute_batch(sql).and_then(|_| {
            self.conn
                .execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
                .map(|_| ())
        });

        match outcome {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                self.conn.execute_batch("ROLLBACK")?;
                Err(e.into())
            }
        }
    }
}
