//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the `Queries` and `Store` ports

pub mod duckdb;
