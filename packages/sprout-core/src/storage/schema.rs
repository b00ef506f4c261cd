//! # Database Schema
//!
//! SQL schema for the file-backed key-value store.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                kv_entries                 │
//! ├───────────────────────────────────────────┤
//! │ key         TEXT PRIMARY KEY              │
//! │ value       TEXT NOT NULL                 │
//! │ updated_at  INTEGER NOT NULL  (unix ms)   │
//! └───────────────────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Application keyspace
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    -- Last write, unix milliseconds
    updated_at INTEGER NOT NULL DEFAULT 0
);
"#;
