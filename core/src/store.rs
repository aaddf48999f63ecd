//! Durable conversation store
//!
//! SQLite-backed keyed record of conversation state. All mutation goes
//! through narrow conditional statements: creation is an idempotent
//! `INSERT OR IGNORE`, the scheduler claim selects and transitions rows in
//! one transaction, and transcript appends are conditional on the revision
//! the caller last read.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::conversation::{Conversation, ConversationStatus, Turn};
use crate::error::FollowUpError;

/// Raw row shape before status/time/transcript decoding
type RawRow = (String, String, String, String, String, i64);

const SELECT_COLUMNS: &str =
    "contact_id, phone_number, status, scheduled_time, transcript, revision";

/// SQLite-backed store of follow-up conversations
pub struct ConversationStore {
    /// Database connection
    connection: Arc<Mutex<Connection>>,
}

impl ConversationStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FollowUpError> {
        let path = path.as_ref();
        info!("Opening conversation store at {}", path.display());

        let conn = Connection::open(path)
            .map_err(|e| FollowUpError::Persistence(format!("failed to open database: {e}")))?;
        conn.busy_timeout(std::time::Duration::from_secs(30))
            .map_err(|e| FollowUpError::Persistence(format!("failed to set busy timeout: {e}")))?;

        let store = Self {
            connection: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open a private in-memory database. Test use only.
    pub fn open_in_memory() -> Result<Self, FollowUpError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FollowUpError::Persistence(format!("failed to open database: {e}")))?;
        let store = Self {
            connection: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), FollowUpError> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                contact_id     TEXT PRIMARY KEY,
                phone_number   TEXT NOT NULL,
                status         TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                transcript     TEXT NOT NULL,
                revision       INTEGER NOT NULL DEFAULT 0,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );",
            [],
        )
        .map_err(|e| FollowUpError::Persistence(format!("failed to create conversations table: {e}")))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_due
             ON conversations(status, scheduled_time);",
            [],
        )
        .map_err(|e| FollowUpError::Persistence(format!("failed to create due index: {e}")))?;

        debug!("Conversation store schema ready");
        Ok(())
    }

    /// Idempotently create a scheduled conversation with an empty transcript.
    /// Returns true when a new row was inserted, false when the contact
    /// already has one (the existing row is left untouched).
    pub fn create_scheduled(
        &self,
        contact_id: &str,
        phone_number: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<bool, FollowUpError> {
        let conn = self.lock()?;
        let now = format_ts(Utc::now());
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO conversations
             (contact_id, phone_number, status, scheduled_time, transcript, revision, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, '[]', 0, ?5, ?5)",
            params![
                contact_id,
                phone_number,
                ConversationStatus::Scheduled.as_str(),
                format_ts(scheduled_time),
                now
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Fetch one conversation by contact id.
    pub fn get(&self, contact_id: &str) -> Result<Option<Conversation>, FollowUpError> {
        let conn = self.lock()?;
        let row: Option<RawRow> = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM conversations WHERE contact_id = ?1"),
                params![contact_id],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                    ))
                },
            )
            .optional()?;
        row.map(hydrate).transpose()
    }

    /// Claim every due conversation: select Scheduled rows whose time has
    /// passed and flip them to Ongoing inside one transaction, so overlapping
    /// scheduler cycles can never pick up the same row twice.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Conversation>, FollowUpError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let raw_rows: Vec<RawRow> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM conversations
                 WHERE status = 'scheduled' AND scheduled_time <= ?1"
            ))?;
            let rows = stmt.query_map(params![format_ts(now)], |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut claimed = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let mut conversation = hydrate(raw)?;
            let updated = tx.execute(
                "UPDATE conversations
                 SET status = 'ongoing', revision = revision + 1, updated_at = ?2
                 WHERE contact_id = ?1 AND status = 'scheduled'",
                params![conversation.contact_id, format_ts(Utc::now())],
            )?;
            if updated > 0 {
                conversation.status = ConversationStatus::Ongoing;
                conversation.revision += 1;
                claimed.push(conversation);
            }
        }
        tx.commit()?;

        if !claimed.is_empty() {
            debug!("Claimed {} due conversation(s)", claimed.len());
        }
        Ok(claimed)
    }

    /// Append turns to a conversation's transcript, conditional on the
    /// revision the caller last read. A concurrent writer winning the race
    /// surfaces as a revision conflict; the caller's turns are not written.
    pub fn append_turns(
        &self,
        contact_id: &str,
        expected_revision: i64,
        turns: &[Turn],
    ) -> Result<(), FollowUpError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current: Option<(String, i64)> = tx
            .query_row(
                "SELECT transcript, revision FROM conversations WHERE contact_id = ?1",
                params![contact_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let (transcript_json, revision) = current
            .ok_or_else(|| FollowUpError::ConversationNotFound(contact_id.to_string()))?;
        if revision != expected_revision {
            return Err(FollowUpError::RevisionConflict {
                contact_id: contact_id.to_string(),
            });
        }

        let mut transcript: Vec<Turn> = serde_json::from_str(&transcript_json)?;
        transcript.extend(turns.iter().cloned());
        let updated = serde_json::to_string(&transcript)?;

        tx.execute(
            "UPDATE conversations
             SET transcript = ?2, revision = revision + 1, updated_at = ?3
             WHERE contact_id = ?1 AND revision = ?4",
            params![contact_id, updated, format_ts(Utc::now()), expected_revision],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, FollowUpError> {
        self.connection
            .lock()
            .map_err(|e| FollowUpError::Persistence(format!("connection lock poisoned: {e}")))
    }
}

/// Fixed-width UTC formatting so lexicographic comparison in SQL matches
/// chronological order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn hydrate(
    (contact_id, phone_number, status, scheduled_time, transcript, revision): RawRow,
) -> Result<Conversation, FollowUpError> {
    Ok(Conversation {
        contact_id,
        phone_number,
        status: status.parse()?,
        scheduled_time: DateTime::parse_from_rfc3339(&scheduled_time)
            .map_err(|e| FollowUpError::Persistence(format!("bad scheduled_time: {e}")))?
            .with_timezone(&Utc),
        transcript: serde_json::from_str(&transcript)?,
        revision,
    })
}
