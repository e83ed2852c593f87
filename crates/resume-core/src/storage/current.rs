//! The current-document slot
//!
//! The live document is the `resumes` row with the greatest `id`. These
//! functions take a plain `&Connection` so they run equally inside a
//! transaction (`Transaction` derefs to `Connection`) or outside one.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::Result;

/// Insert `{}` if the slot has never been initialized
pub(crate) fn seed(conn: &Connection, at: DateTime<Utc>) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM resumes", [], |row| row.get(0))?;
    if count == 0 {
        let ms = at.timestamp_millis();
        conn.execute(
            "INSERT INTO resumes (data, created_at_ms, updated_at_ms) VALUES ('{}', ?1, ?1)",
            params![ms],
        )?;
    }
    Ok(())
}

/// Current document as raw JSON; `{}` if the slot is empty
pub fn load(conn: &Connection) -> Result<Value> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT data FROM resumes ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Value::Object(Default::default())),
    }
}

/// Overwrite the current document
pub fn store(conn: &Connection, data: &Value, at: DateTime<Utc>) -> Result<()> {
    let payload = serde_json::to_string(data)?;
    let ms = at.timestamp_millis();
    let updated = conn.execute(
        "UPDATE resumes SET data = ?1, updated_at_ms = ?2
         WHERE id = (SELECT id FROM resumes ORDER BY id DESC LIMIT 1)",
        params![payload, ms],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO resumes (data, created_at_ms, updated_at_ms) VALUES (?1, ?2, ?2)",
            params![payload, ms],
        )?;
    }
    Ok(())
}
