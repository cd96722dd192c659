use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, Row};
use tracing::info;

use super::{default_records, PolicyStore, Result, StoreError};
use crate::error::PolicyError;
use crate::schema::{rule_catalog, PolicyRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS rule_meta (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    type        TEXT NOT NULL,
    value_type  TEXT NOT NULL,
    operator    TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS policy (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    enable      INTEGER NOT NULL DEFAULT 1,
    type        TEXT NOT NULL,
    rule_id     TEXT NOT NULL,
    operator    TEXT NOT NULL,
    value       TEXT NOT NULL,
    level       TEXT NOT NULL,
    special     INTEGER NOT NULL DEFAULT 0,
    priority    INTEGER NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    suggestion  TEXT NOT NULL DEFAULT ''
);
";

/// SQLite-backed policy store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn), location: path.to_path_buf() })
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn: Mutex::new(conn), location: PathBuf::from(":memory:") })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().expect("sqlite connection lock poisoned");
        f(&mut conn)
    }
}

fn sync_rule_meta(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO rule_meta (id, name, type, value_type, operator, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for meta in rule_catalog() {
        let operators: Vec<&str> = meta.operators.iter().map(|o| o.as_str()).collect();
        stmt.execute(params![
            meta.id_str,
            meta.name,
            meta.kind.to_string(),
            meta.value_type.to_string(),
            serde_json::to_string(&operators)?,
            meta.description,
        ])?;
    }
    Ok(())
}

fn insert_records(conn: &Connection, records: &[PolicyRecord]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO policy
            (id, name, enable, type, rule_id, operator, value, level, special, priority, description, suggestion)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    for r in records {
        stmt.execute(params![
            r.id,
            r.name,
            r.enable,
            r.kind.to_string(),
            r.rule_id,
            r.operator.as_str(),
            r.value,
            r.level.as_str(),
            r.special,
            r.priority,
            r.description,
            r.suggestion,
        ])?;
    }
    Ok(())
}

/// Raw column text, parsed after the row is read.
struct PolicyRow {
    id: String,
    name: String,
    enable: bool,
    kind: String,
    rule_id: String,
    operator: String,
    value: String,
    level: String,
    special: bool,
    priority: i64,
    description: String,
    suggestion: String,
}

impl PolicyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            enable: row.get(2)?,
            kind: row.get(3)?,
            rule_id: row.get(4)?,
            operator: row.get(5)?,
            value: row.get(6)?,
            level: row.get(7)?,
            special: row.get(8)?,
            priority: row.get(9)?,
            description: row.get(10)?,
            suggestion: row.get(11)?,
        })
    }

    fn into_record(self) -> std::result::Result<PolicyRecord, PolicyError> {
        Ok(PolicyRecord {
            kind: self.kind.parse()?,
            operator: self.operator.parse()?,
            level: self.level.parse()?,
            id: self.id,
            name: self.name,
            enable: self.enable,
            rule_id: self.rule_id,
            value: self.value,
            special: self.special,
            priority: self.priority,
            description: self.description,
            suggestion: self.suggestion,
        })
    }
}

impl PolicyStore for SqliteStore {
    fn init(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            let tx = conn.transaction()?;
            sync_rule_meta(&tx)?;
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM policy", [], |r| r.get(0))?;
            if count == 0 {
                let records = default_records();
                insert_records(&tx, &records)?;
                info!(path = %self.location.display(), count = records.len(), "seeded default policy catalog");
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn read_records(&self) -> Result<Vec<PolicyRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, enable, type, rule_id, operator, value, level, special, priority, description, suggestion
                 FROM policy ORDER BY seq",
            )?;
            let rows = stmt
                .query_map([], PolicyRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|row| row.into_record().map_err(StoreError::from))
                .collect()
        })
    }

    /// Replaces every record in one transaction.
    fn write_records(&self, records: &[PolicyRecord]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM policy", [])?;
            insert_records(&tx, records)?;
            tx.commit()?;
            info!(path = %self.location.display(), count = records.len(), "wrote policy catalog");
            Ok(())
        })
    }

    fn location(&self) -> String {
        self.location.display().to_string()
    }
}
