use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use log::error;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, parse_mood},
    },
    error::CoreError,
    history::HistoryStore,
    models::{HistoryLogEntry, Mood},
};

fn row_to_entry(row: &Row) -> Result<HistoryLogEntry> {
    let mood: String = row.get("mood")?;
    let created_at: String = row.get("created_at")?;

    Ok(HistoryLogEntry {
        id: row.get("id")?,
        mood: parse_mood(&mood)?,
        timestamp: parse_datetime(&created_at, "created_at")?,
        note: row.get("note")?,
    })
}

fn insert_entry(conn: &Connection, entry: &HistoryLogEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO history_logs (id, mood, created_at, note)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.id,
            entry.mood.as_str(),
            entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.note,
        ],
    )?;
    Ok(())
}

impl Database {
    pub async fn insert_history_log(&self, entry: &HistoryLogEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| insert_entry(conn, &record)).await
    }

    pub async fn get_history_log(&self, id: &str) -> Result<Option<HistoryLogEntry>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, mood, created_at, note FROM history_logs WHERE id = ?1",
            )?;
            let entry = stmt
                .query_row(params![id], |row| Ok(row_to_entry(row)))
                .optional()?
                .transpose()?;
            Ok(entry)
        })
        .await
    }

    /// Newest first.
    pub async fn list_history_logs(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryLogEntry>> {
        let limit = i64::try_from(limit).map_err(|_| anyhow!("limit {limit} out of range"))?;
        let offset = i64::try_from(offset).map_err(|_| anyhow!("offset {offset} out of range"))?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, mood, created_at, note
                 FROM history_logs
                 ORDER BY created_at DESC
                 LIMIT ?1 OFFSET ?2",
            )?;

            let mut rows = stmt.query(params![limit, offset])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }

    /// Attach or clear the journal note for a logged selection.
    pub async fn update_history_note(&self, id: &str, note: Option<String>) -> Result<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE history_logs SET note = ?1 WHERE id = ?2",
                params![note, id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("History entry not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn delete_history_log(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM history_logs WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl HistoryStore for Database {
    fn log_selection(&self, mood: Mood) -> HistoryLogEntry {
        let entry = HistoryLogEntry::new(mood);
        let record = entry.clone();
        if let Err(err) = self.submit("insert history log", move |conn| insert_entry(conn, &record)) {
            error!("Failed to queue history log {}: {err:#}", entry.id);
        }
        entry
    }

    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<HistoryLogEntry>, CoreError> {
        self.list_history_logs(limit, offset)
            .await
            .map_err(CoreError::from)
    }
}
