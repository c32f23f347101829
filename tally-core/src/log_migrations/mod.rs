//! Event log migrations - embedded SQL files for logs.duckdb

/// Format: (filename, sql_content)
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_event_log.sql", include_str!("001_event_log.sql")),
];
