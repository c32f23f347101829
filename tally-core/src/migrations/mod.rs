//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary at build time using include_str!.
//! Each migration is a tuple of (name, sql_content), applied in order.

/// All ledger migrations, embedded at compile time.
///
/// When adding a migration, create `NNN_description.sql` and append it here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_ledger_schema.sql", include_str!("001_ledger_schema.sql")),
    ("002_email_verification.sql", include_str!("002_email_verification.sql")),
];
