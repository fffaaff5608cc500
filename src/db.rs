use crate::store::{Collection, CollectionBackend};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub const DB_FILE_NAME: &str = "attendance.sqlite3";
const SCHEMA_VERSION: i64 = 2;

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE_NAME)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let conn = Connection::open(db_path(workspace))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections(
            name TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    let version = settings_get_json(&conn, "schema.version")?
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    if version < SCHEMA_VERSION {
        migrate_records_school_ids(&conn)?;
        settings_set_json(&conn, "schema.version", &serde_json::json!(SCHEMA_VERSION))?;
    }

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM meta WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    match raw {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("meta {} is invalid JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO meta(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

// v1 workspaces stored records without a school id. Stamp them from the
// owning student so school-scoped reads keep seeing them.
fn migrate_records_school_ids(conn: &Connection) -> anyhow::Result<()> {
    let load = |name: &str| -> anyhow::Result<Option<Vec<serde_json::Value>>> {
        let raw: Option<String> = conn
            .query_row("SELECT payload FROM collections WHERE name = ?", [name], |r| r.get(0))
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    };
    let (Some(students), Some(mut records)) = (load("students")?, load("records")?) else {
        return Ok(());
    };

    let mut changed = 0usize;
    for rec in records.iter_mut() {
        let has_school = rec
            .get("schoolId")
            .and_then(|v| v.as_str())
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if has_school {
            continue;
        }
        let owner = students.iter().find(|s| s.get("id") == rec.get("studentId"));
        if let Some(school_id) = owner.and_then(|s| s.get("schoolId")).cloned() {
            rec["schoolId"] = school_id;
            changed += 1;
        }
    }
    if changed > 0 {
        conn.execute(
            "UPDATE collections SET payload = ? WHERE name = 'records'",
            [serde_json::to_string(&records)?],
        )?;
        tracing::info!(changed, "stamped school ids on legacy attendance records");
    }
    Ok(())
}

/// Durable backend: one JSON array per collection row.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: open_db(workspace)?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl CollectionBackend for SqliteBackend {
    fn load(&self, collection: Collection) -> anyhow::Result<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM collections WHERE name = ?",
                [collection.key()],
                |r| r.get(0),
            )
            .optional()
            .with_context(|| format!("failed to load collection {}", collection))?;
        Ok(payload)
    }

    fn save(&mut self, batch: &[(Collection, String)]) -> anyhow::Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction().context("failed to begin transaction")?;
        for (collection, payload) in batch {
            tx.execute(
                "INSERT INTO collections(name, payload, updated_at) VALUES(?, ?, ?)
                 ON CONFLICT(name) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                (collection.key(), payload, &now),
            )
            .with_context(|| format!("failed to write collection {}", collection))?;
        }
        tx.commit().context("failed to commit collections")?;
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM collections", [])
            .context("failed to clear collections")?;
        Ok(())
    }
}
