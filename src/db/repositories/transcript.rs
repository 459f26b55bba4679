//! Transcript repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub bot_name: String,
    pub user_input: String,
    pub reply: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TranscriptRepository {
    db: Database,
}

impl TranscriptRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record one completed chat turn
    pub async fn append(
        &self,
        bot_name: &str,
        user_input: &str,
        reply: &str,
    ) -> Result<TranscriptEntry> {
        let entry = TranscriptEntry {
            id: Uuid::new_v4().to_string(),
            bot_name: bot_name.to_string(),
            user_input: user_input.to_string(),
            reply: reply.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO transcripts (id, bot_name, user_input, reply, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id,
                entry.bot_name,
                entry.user_input,
                entry.reply,
                entry.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert transcript entry")?;

        tracing::debug!("Recorded transcript entry: {}", entry.id);
        Ok(entry)
    }

    /// Most recent turns, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<TranscriptEntry>> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, bot_name, user_input, reply, created_at
             FROM transcripts ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], Self::map_row)?;
        let entries = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to collect transcript entries")?;

        Ok(entries)
    }

    pub async fn count(&self) -> Result<usize> {
        let conn = self.db.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM transcripts", [], |row| row.get(0))
            .context("Failed to count transcript entries")?;
        Ok(count as usize)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TranscriptEntry> {
        Ok(TranscriptEntry {
            id: row.get(0)?,
            bot_name: row.get(1)?,
            user_input: row.get(2)?,
            reply: row.get(3)?,
            created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
