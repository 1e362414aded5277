//! Turso Embedded / libSQL storage layer.
//!
//! The [`Storage`] struct wraps a libSQL database holding two logical tables:
//! login credentials (`users`) and the classified records of the most recent
//! upload (`users_data`, one TEXT column per field).
//!
//! Record replacement is transactional: columns are added, old rows deleted,
//! and new rows inserted inside one transaction, so a failure part-way leaves
//! the previous rows in place. All values are bound as parameters; column
//! identifiers are quoted.

mod migrations;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use inviteboard_shared::{InviteBoardError, Result};
use libsql::params::Params;
use libsql::{Connection, Database, Value, params};
use tracing::{debug, info, warn};

/// Name of the records table.
const RECORDS_TABLE: &str = "users_data";

/// Bookkeeping columns of the records table that are never data fields.
const RESERVED_COLUMNS: [&str; 2] = ["id", "upload_date"];

/// Rows per multi-row INSERT statement.
const INSERT_CHUNK_ROWS: usize = 50;

/// SQLite's bound-parameter ceiling, with headroom.
const MAX_BOUND_PARAMS: usize = 32_000;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// A stored login credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub id: i64,
    pub username: String,
    /// Hex-encoded password hash.
    pub password_hash: String,
    pub is_admin: bool,
    pub email: Option<String>,
}

/// Rows to write in place of everything currently stored.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    /// Stored column names (already lower-cased/underscored), unique.
    pub columns: Vec<String>,
    /// One entry per row, aligned with `columns`.
    pub rows: Vec<Vec<Option<String>>>,
    pub uploaded_at: DateTime<Utc>,
}

/// Everything currently in the records table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    /// Stored column names in table order, bookkeeping columns excluded.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Upload time recorded with the first row.
    pub uploaded_at: Option<DateTime<Utc>>,
}

fn storage_err(e: libsql::Error) -> InviteBoardError {
    InviteBoardError::Storage(e.to_string())
}

/// Quote an SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell_value(cell: &Option<String>) -> Value {
    match cell {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn value_to_cell(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Parse an `upload_date` value: RFC 3339 as written by uploads, or SQLite's
/// `datetime('now')` format for rows inserted with the column default.
fn parse_upload_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| InviteBoardError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        InviteBoardError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Credential operations
    // -----------------------------------------------------------------------

    /// Insert a user unless one with the same username exists.
    /// Returns `true` if a row was created.
    pub async fn insert_user_if_absent(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "INSERT INTO users (username, password, is_admin) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO NOTHING",
                params![username, password_hash, i64::from(is_admin)],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// Look up a user by username.
    pub async fn find_user(&self, username: &str) -> Result<Option<StoredCredential>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, username, password, is_admin, email FROM users WHERE username = ?1",
                params![username],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(StoredCredential {
                id: row.get::<i64>(0).map_err(storage_err)?,
                username: row.get::<String>(1).map_err(storage_err)?,
                password_hash: row.get::<String>(2).map_err(storage_err)?,
                is_admin: row.get::<i64>(3).map_err(storage_err)? != 0,
                email: row.get::<String>(4).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Replace a user's password hash. Returns `false` if no such user.
    pub async fn update_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE users SET password = ?1 WHERE username = ?2",
                params![password_hash, username],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// Set or clear a user's email address. Returns `false` if no such user.
    pub async fn update_email(&self, username: &str, email: Option<&str>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE users SET email = ?1 WHERE username = ?2",
                params![email, username],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Record operations
    // -----------------------------------------------------------------------

    /// Data columns of the records table, in table order.
    pub async fn record_columns(&self) -> Result<Vec<String>> {
        Self::table_columns(&self.conn).await
    }

    async fn table_columns(conn: &Connection) -> Result<Vec<String>> {
        let mut rows = conn
            .query(&format!("PRAGMA table_info({RECORDS_TABLE})"), params![])
            .await
            .map_err(storage_err)?;

        let mut columns = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let name: String = row.get(1).map_err(storage_err)?;
            if !RESERVED_COLUMNS.contains(&name.as_str()) {
                columns.push(name);
            }
        }
        Ok(columns)
    }

    /// Number of stored records.
    pub async fn count_records(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {RECORDS_TABLE}"), params![])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let n = row.get::<i64>(0).map_err(storage_err)?;
                Ok(u64::try_from(n).unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    /// Replace every stored record with `batch`, adding any columns the table
    /// lacks (`required` first, then the batch's own columns).
    ///
    /// Runs in one transaction; on error nothing changes.
    pub async fn replace_records(&self, batch: &RecordBatch, required: &[String]) -> Result<u64> {
        for column in &batch.columns {
            if RESERVED_COLUMNS.contains(&column.as_str()) {
                return Err(InviteBoardError::validation(format!(
                    "column name '{column}' is reserved"
                )));
            }
        }
        if let Some((i, row)) = batch
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != batch.columns.len())
        {
            return Err(InviteBoardError::validation(format!(
                "row {} has {} values for {} columns",
                i + 1,
                row.len(),
                batch.columns.len()
            )));
        }

        let tx = self.conn.transaction().await.map_err(storage_err)?;

        match Self::write_records(&tx, batch, required).await {
            Ok(inserted) => {
                tx.commit().await.map_err(storage_err)?;
                info!(rows = inserted, columns = batch.columns.len(), "records replaced");
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed record write also failed");
                }
                Err(e)
            }
        }
    }

    async fn write_records(
        conn: &Connection,
        batch: &RecordBatch,
        required: &[String],
    ) -> Result<u64> {
        let existing = Self::table_columns(conn).await?;
        let mut added: Vec<&str> = Vec::new();
        for column in required.iter().chain(batch.columns.iter()) {
            if RESERVED_COLUMNS.contains(&column.as_str())
                || existing.iter().any(|c| c == column)
                || added.contains(&column.as_str())
            {
                continue;
            }
            conn.execute(
                &format!(
                    "ALTER TABLE {RECORDS_TABLE} ADD COLUMN {} TEXT",
                    quote_ident(column)
                ),
                params![],
            )
            .await
            .map_err(storage_err)?;
            added.push(column);
        }
        if !added.is_empty() {
            debug!(columns = ?added, "added record columns");
        }

        let deleted = conn
            .execute(&format!("DELETE FROM {RECORDS_TABLE}"), params![])
            .await
            .map_err(storage_err)?;
        debug!(deleted, "cleared previous records");

        if batch.rows.is_empty() {
            return Ok(0);
        }

        let column_list = std::iter::once("upload_date".to_string())
            .chain(batch.columns.iter().map(|c| quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let width = batch.columns.len() + 1;
        let row_placeholders = format!("({})", vec!["?"; width].join(", "));
        let chunk_rows = INSERT_CHUNK_ROWS.min(MAX_BOUND_PARAMS / width).max(1);
        let uploaded_at = batch.uploaded_at.to_rfc3339();

        let mut inserted = 0;
        for chunk in batch.rows.chunks(chunk_rows) {
            let sql = format!(
                "INSERT INTO {RECORDS_TABLE} ({column_list}) VALUES {}",
                vec![row_placeholders.as_str(); chunk.len()].join(", ")
            );
            let mut values = Vec::with_capacity(chunk.len() * width);
            for row in chunk {
                values.push(Value::Text(uploaded_at.clone()));
                values.extend(row.iter().map(cell_value));
            }
            inserted += conn
                .execute(&sql, Params::Positional(values))
                .await
                .map_err(storage_err)?;
        }
        Ok(inserted)
    }

    /// Read every stored record. Returns `None` if the table has no rows.
    pub async fn load_records(&self) -> Result<Option<StoredTable>> {
        let columns = self.record_columns().await?;

        let select_list = std::iter::once("upload_date".to_string())
            .chain(columns.iter().map(|c| quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {select_list} FROM {RECORDS_TABLE} ORDER BY id"),
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut uploaded_at = None;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            if out.is_empty() {
                uploaded_at = row
                    .get::<String>(0)
                    .ok()
                    .and_then(|raw| parse_upload_date(&raw));
            }
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let idx = i32::try_from(i + 1)
                    .map_err(|_| InviteBoardError::Storage("too many columns".into()))?;
                cells.push(value_to_cell(row.get_value(idx).map_err(storage_err)?));
            }
            out.push(cells);
        }

        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(StoredTable {
            columns,
            rows: out,
            uploaded_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ib_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn batch(columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> RecordBatch {
        RecordBatch {
            columns: cols(columns),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|c| c.map(String::from)).collect())
                .collect(),
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ib_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn user_crud() {
        let storage = test_storage().await;

        assert!(storage.insert_user_if_absent("admin", "h1", true).await.unwrap());
        assert!(!storage.insert_user_if_absent("admin", "h2", false).await.unwrap());

        let user = storage.find_user("admin").await.unwrap().expect("admin exists");
        assert_eq!(user.password_hash, "h1");
        assert!(user.is_admin);
        assert_eq!(user.email, None);

        assert!(storage.update_password("admin", "h3").await.unwrap());
        assert!(storage.update_email("admin", Some("a@example.org")).await.unwrap());
        let user = storage.find_user("admin").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "h3");
        assert_eq!(user.email.as_deref(), Some("a@example.org"));

        assert!(!storage.update_password("ghost", "x").await.unwrap());
        assert!(storage.find_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_table_loads_as_none() {
        let storage = test_storage().await;
        assert!(storage.load_records().await.unwrap().is_none());
        assert_eq!(storage.count_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_then_load() {
        let storage = test_storage().await;
        let b = batch(
            &["first_name", "description", "org"],
            vec![
                vec![Some("Ann"), Some("Ward1 x"), Some("Ward1")],
                vec![Some("Bob"), None, Some("(blank org)")],
            ],
        );
        let required = cols(&["email", "org"]);
        let n = storage.replace_records(&b, &required).await.unwrap();
        assert_eq!(n, 2);

        let table = storage.load_records().await.unwrap().expect("rows");
        assert_eq!(table.columns, cols(&["email", "org", "first_name", "description"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec![None, Some("(blank org)".into()), Some("Bob".into()), None]);
        assert!(table.uploaded_at.is_some());
    }

    #[tokio::test]
    async fn replace_discards_previous_rows() {
        let storage = test_storage().await;
        let first = batch(&["org"], vec![vec![Some("A")], vec![Some("B")], vec![Some("C")]]);
        storage.replace_records(&first, &[]).await.unwrap();

        let second = batch(&["org", "note"], vec![vec![Some("Z"), Some("new column")]]);
        storage.replace_records(&second, &[]).await.unwrap();

        assert_eq!(storage.count_records().await.unwrap(), 1);
        let table = storage.load_records().await.unwrap().unwrap();
        assert_eq!(table.columns, cols(&["org", "note"]));
        assert_eq!(table.rows[0], vec![Some("Z".into()), Some("new column".into())]);
    }

    #[tokio::test]
    async fn bulk_insert_spans_chunks() {
        let storage = test_storage().await;
        let rows = (0..123).map(|_| vec![Some("x")]).collect();
        let b = batch(&["org"], rows);
        assert_eq!(storage.replace_records(&b, &[]).await.unwrap(), 123);
        assert_eq!(storage.count_records().await.unwrap(), 123);
    }

    #[tokio::test]
    async fn values_are_bound_not_interpolated() {
        let storage = test_storage().await;
        let nasty = "O'Brien\"); DROP TABLE users; --";
        let b = batch(&["last_name", "weird \"col\""], vec![vec![Some(nasty), Some("ok")]]);
        storage.replace_records(&b, &[]).await.unwrap();

        let table = storage.load_records().await.unwrap().unwrap();
        assert_eq!(table.rows[0][0].as_deref(), Some(nasty));
        assert_eq!(table.columns[1], "weird \"col\"");
        assert!(storage.insert_user_if_absent("u", "h", false).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_batch_leaves_previous_rows() {
        let storage = test_storage().await;
        let first = batch(&["org"], vec![vec![Some("A")]]);
        storage.replace_records(&first, &[]).await.unwrap();

        let ragged = batch(&["org", "email"], vec![vec![Some("B")]]);
        assert!(storage.replace_records(&ragged, &[]).await.is_err());

        let reserved = batch(&["id"], vec![vec![Some("1")]]);
        let err = storage.replace_records(&reserved, &[]).await.unwrap_err();
        assert!(err.to_string().contains("reserved"));

        let table = storage.load_records().await.unwrap().unwrap();
        assert_eq!(table.rows, vec![vec![Some("A".to_string())]]);
    }

    #[tokio::test]
    async fn insert_failure_after_delete_rolls_back() {
        let storage = test_storage().await;
        let first = batch(&["org"], vec![vec![Some("A")], vec![Some("B")]]);
        storage.replace_records(&first, &[]).await.unwrap();

        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON users_data \
                 WHEN NEW.org = 'boom' \
                 BEGIN SELECT RAISE(ABORT, 'insert rejected'); END;",
            )
            .await
            .unwrap();

        // The new column and the DELETE both run before the second row aborts.
        let second = batch(
            &["org", "note"],
            vec![vec![Some("C"), Some("x")], vec![Some("boom"), None]],
        );
        let err = storage.replace_records(&second, &[]).await.unwrap_err();
        assert!(err.to_string().contains("insert rejected"));

        let table = storage.load_records().await.unwrap().unwrap();
        assert_eq!(
            table.rows,
            vec![vec![Some("A".to_string())], vec![Some("B".to_string())]]
        );
        assert_eq!(table.columns, cols(&["org"]));
        assert_eq!(storage.count_records().await.unwrap(), 2);
    }

    #[test]
    fn upload_date_formats() {
        assert!(parse_upload_date("2024-05-01T10:00:00+00:00").is_some());
        assert!(parse_upload_date("2024-05-01 10:00:00").is_some());
        assert!(parse_upload_date("yesterday").is_none());
    }
}
