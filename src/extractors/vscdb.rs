//! Read-only access to the `state.vscdb` SQLite key-value stores used by
//! VS Code based editors.

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

pub const ITEM_TABLE: &str = "ItemTable";
pub const DISK_KV_TABLE: &str = "cursorDiskKV";
pub const STATE_DB: &str = "state.vscdb";

pub fn open_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database: {}", path.display()))
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => None,
    }
}

/// Value stored under `key`, as text. Missing tables read as missing keys.
pub fn get_value(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, table)? {
        return Ok(None);
    }

    let sql = format!("SELECT value FROM {table} WHERE key = ?1");
    let value = conn
        .query_row(&sql, [key], |row| Ok(value_text(row.get_ref(0)?)))
        .optional()
        .with_context(|| format!("Failed to read key {key} from {table}"))?;
    Ok(value.flatten())
}

pub fn get_json(conn: &Connection, table: &str, key: &str) -> Result<Option<serde_json::Value>> {
    match get_value(conn, table, key)? {
        Some(raw) => Ok(Some(
            serde_json::from_str(&raw).with_context(|| format!("Invalid JSON under key {key}"))?,
        )),
        None => Ok(None),
    }
}

/// All `(key, value)` pairs whose key starts with `prefix`.
pub fn values_with_prefix(conn: &Connection, table: &str, prefix: &str) -> Result<Vec<(String, String)>> {
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let sql = format!("SELECT key, value FROM {table} WHERE key LIKE ?1 || '%'");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([prefix], |row| {
        Ok((row.get::<_, String>(0)?, value_text(row.get_ref(1)?)))
    })?;

    let mut values = Vec::new();
    for row in rows {
        let (key, value) = row?;
        if let Some(value) = value.filter(|_| key.starts_with(prefix)) {
            values.push((key, value));
        }
    }
    Ok(values)
}

/// `<root>/<workspace-id>/state.vscdb` for every workspace under `root`.
pub fn workspace_databases(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut databases: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join(STATE_DB))
        .filter(|path| path.is_file())
        .collect();
    databases.sort();
    databases
}
