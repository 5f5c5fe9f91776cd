//! Database schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS session_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";
