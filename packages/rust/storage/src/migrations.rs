//! SQL migration definitions for the InviteBoard database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.
//!
//! The records table starts with only its bookkeeping columns; data columns
//! are added on upload, one per uploaded header.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: users, users_data",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Login credentials
CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0
);

-- Classified records; data columns are added dynamically
CREATE TABLE IF NOT EXISTS users_data (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    upload_date TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Optional email address on credentials",
            sql: r#"
ALTER TABLE users ADD COLUMN email TEXT;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
