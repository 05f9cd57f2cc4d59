use super::progress::{CharacterProgress, PracticeRecord, ProgressTracker};
use super::store::KeyValueStore;
use crate::error::Result;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS practice_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        character TEXT NOT NULL,
        score REAL NOT NULL,
        timestamp TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_practice_history_char ON practice_history(character);
    CREATE INDEX IF NOT EXISTS idx_practice_history_timestamp ON practice_history(timestamp);
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Per-character row of [`PracticeDb::all_progress`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub character: String,
    pub progress: CharacterProgress,
}

/// SQLite-backed practice history and key-value storage
#[derive(Debug)]
pub struct PracticeDb {
    conn: Connection,
}

impl PracticeDb {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(PracticeDb { conn })
    }

    /// All attempts for a character, newest first
    pub fn history(&self, character: &str) -> Result<Vec<PracticeRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT character, score, timestamp
            FROM practice_history
            WHERE character = ?1
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([character], |row| {
            Ok(PracticeRecord {
                character: row.get(0)?,
                score: row.get(1)?,
                timestamp: parse_timestamp(row.get(2)?, 2)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// Aggregates for every character that has at least one attempt
    pub fn all_progress(&self) -> Result<Vec<ProgressSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT character, COUNT(*), AVG(score), MAX(timestamp)
            FROM practice_history
            GROUP BY character
            ORDER BY character
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let last: Option<String> = row.get(3)?;
            Ok(ProgressSummary {
                character: row.get(0)?,
                progress: CharacterProgress {
                    attempts: row.get::<_, i64>(1)? as usize,
                    average_score: row.get(2)?,
                    last_practiced: last.map(|ts| parse_timestamp(ts, 3)).transpose()?,
                },
            })
        })?;

        let mut summary = Vec::new();
        for item in rows {
            summary.push(item?);
        }
        Ok(summary)
    }

    /// Drop all history and stored state
    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM practice_history; DELETE FROM kv_store;")?;
        Ok(())
    }

    /// Write the full practice history as CSV, oldest first. Returns the row count.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT character, score, timestamp FROM practice_history ORDER BY timestamp, id",
        )?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["character", "score", "timestamp"])?;

        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let character: String = row.get(0)?;
            let score: f64 = row.get(1)?;
            let timestamp: String = row.get(2)?;
            writer.write_record([character, format!("{score:.3}"), timestamp])?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    }
}

fn parse_timestamp(raw: String, column: usize) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                column,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

impl ProgressTracker for PracticeDb {
    fn record_character_practice(
        &mut self,
        character: &str,
        score: f64,
        timestamp: DateTime<Local>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO practice_history (character, score, timestamp) VALUES (?1, ?2, ?3)",
            params![
                character,
                score,
                timestamp
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;
        Ok(())
    }

    fn get_character_progress(&self, character: &str) -> Result<CharacterProgress> {
        let (attempts, average_score, last): (i64, Option<f64>, Option<String>) =
            self.conn.query_row(
                r#"
                SELECT COUNT(*), AVG(score), MAX(timestamp)
                FROM practice_history
                WHERE character = ?1
                "#,
                [character],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(CharacterProgress {
            attempts: attempts as usize,
            average_score,
            last_practiced: last.map(|ts| parse_timestamp(ts, 2)).transpose()?,
        })
    }
}

impl KeyValueStore for PracticeDb {
    fn save_data(&mut self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, encoded],
        )?;
        Ok(())
    }

    fn load_data(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }
}
