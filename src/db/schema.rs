//! Versioned layout of the cache database.
//!
//! `PRAGMA user_version` holds the number of migrations applied. Each step
//! only adds objects, so upgrading never touches data in existing tables.

/// Migrations in order; entry `n` upgrades the schema from version `n` to `n + 1`.
pub const MIGRATIONS: &[&str] = &[
  // v1: projects keyed by id, with a local write stamp
  r#"
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    data TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_last_modified
    ON projects(last_modified);
"#,
  // v2: generic keyed cache entries
  r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_timestamp
    ON cache_entries(timestamp);
"#,
];

pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;
