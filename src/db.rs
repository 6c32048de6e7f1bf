// 🗄️ Entity Store - SQLite + WAL
// Durable home for students, recognitions, endorsements, redemptions and
// the audit event log.
//
// The store is the sole arbiter of consistency. Every mutating operation
// runs inside one BEGIN IMMEDIATE transaction: the write lock is taken
// before the first read, so check-then-act cannot interleave with another
// writer on any connection. Lock contention is retried a bounded number
// of times and then surfaces as LedgerError::Conflict.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{DatabaseConfig, LedgerConfig};
use crate::entities::{
    Endorsement, Recognition, RecognitionEntry, RecognitionFilter, Redemption, Student,
};
use crate::error::{LedgerError, LedgerResult};
use crate::period::Period;

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: impl ToString,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORE HANDLE
// ============================================================================

/// One connection plus the retry policy for its transactions
pub struct Store {
    conn: Connection,
    max_conflict_retries: u32,
}

impl Store {
    /// Open (or create) a file-backed store and make sure the schema exists
    pub fn open(path: impl AsRef<Path>, settings: &DatabaseConfig) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))?;
        setup_database(&conn)?;

        Ok(Store {
            conn,
            max_conflict_retries: settings.max_conflict_retries,
        })
    }

    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;

        Ok(Store {
            conn,
            max_conflict_retries: DatabaseConfig::default().max_conflict_retries,
        })
    }

    /// Run `op` as one atomic read-modify-write unit
    ///
    /// Any error from `op` rolls the whole transaction back. Lock contention
    /// re-runs `op` from scratch on fresh state.
    pub fn write<T, F>(&mut self, mut op: F) -> LedgerResult<T>
    where
        F: FnMut(&rusqlite::Transaction<'_>) -> LedgerResult<T>,
    {
        let conn = &mut self.conn;
        retry_on_contention(self.max_conflict_retries, || {
            run_transaction(conn, TransactionBehavior::Immediate, &mut op)
        })
    }

    /// Consistent snapshot read; never takes the write lock
    pub fn read<T, F>(&mut self, mut op: F) -> LedgerResult<T>
    where
        F: FnMut(&rusqlite::Transaction<'_>) -> LedgerResult<T>,
    {
        let conn = &mut self.conn;
        retry_on_contention(self.max_conflict_retries, || {
            run_transaction(conn, TransactionBehavior::Deferred, &mut op)
        })
    }
}

/// Re-run `attempt` while the store reports lock contention, at most
/// `max_retries` extra times, then give up with `Conflict`
fn retry_on_contention<T, F>(max_retries: u32, mut attempt: F) -> LedgerResult<T>
where
    F: FnMut() -> LedgerResult<T>,
{
    let max_attempts = max_retries + 1;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match attempt() {
            Err(err) if err.is_contention() => {
                if attempts >= max_attempts {
                    warn!(attempts, "store still busy, giving up");
                    return Err(LedgerError::Conflict { attempts });
                }
                warn!(attempt = attempts, error = %err, "store busy, retrying transaction");
                std::thread::sleep(Duration::from_millis(5 * u64::from(attempts)));
            }
            other => return other,
        }
    }
}

fn run_transaction<T, F>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    op: &mut F,
) -> LedgerResult<T>
where
    F: FnMut(&rusqlite::Transaction<'_>) -> LedgerResult<T>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> LedgerResult<()> {
    // WAL for crash recovery and snapshot reads alongside one writer.
    // In-memory databases answer "memory" and stay that way.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "database opened");

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // ==========================================================================
    // Students (the only mutable rows)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            available_credits INTEGER NOT NULL CHECK (available_credits >= 0),
            monthly_sent INTEGER NOT NULL CHECK (monthly_sent >= 0),
            last_reset_period TEXT NOT NULL,
            received_balance INTEGER NOT NULL CHECK (received_balance >= 0),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Recognitions (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS recognitions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL REFERENCES students(id),
            recipient_id INTEGER NOT NULL REFERENCES students(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            message TEXT,
            created_at TEXT NOT NULL,
            CHECK (sender_id <> recipient_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Endorsements (append-only, one per recognition/endorser)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS endorsements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recognition_id INTEGER NOT NULL REFERENCES recognitions(id),
            endorser_id INTEGER NOT NULL REFERENCES students(id),
            created_at TEXT NOT NULL,
            UNIQUE (recognition_id, endorser_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Redemptions (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS redemptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            voucher_value INTEGER NOT NULL CHECK (voucher_value >= 0),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_recognitions_sender ON recognitions(sender_id);
         CREATE INDEX IF NOT EXISTS idx_recognitions_recipient ON recognitions(recipient_id);
         CREATE INDEX IF NOT EXISTS idx_recognitions_created ON recognitions(created_at);
         CREATE INDEX IF NOT EXISTS idx_endorsements_recognition ON endorsements(recognition_id);
         CREATE INDEX IF NOT EXISTS idx_redemptions_student ON redemptions(student_id);
         CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);",
    )?;

    Ok(())
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

/// Fixed-width UTC timestamps so text ordering equals time ordering
fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn period_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Period> {
    let raw: String = row.get(idx)?;
    raw.parse::<Period>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============================================================================
// STUDENTS
// ============================================================================

const STUDENT_COLUMNS: &str =
    "id, name, available_credits, monthly_sent, last_reset_period, received_balance";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        available_credits: row.get(2)?,
        monthly_sent: row.get(3)?,
        last_reset_period: period_column(row, 4)?,
        received_balance: row.get(5)?,
    })
}

pub fn insert_student(
    conn: &Connection,
    name: &str,
    period: Period,
    config: &LedgerConfig,
) -> LedgerResult<Student> {
    conn.execute(
        "INSERT INTO students (
            name, available_credits, monthly_sent, last_reset_period, received_balance, created_at
        ) VALUES (?1, ?2, 0, ?3, 0, ?4)",
        params![
            name,
            config.monthly_base_credits,
            period.to_string(),
            format_timestamp(&Utc::now()),
        ],
    )?;

    Ok(Student::registered(
        conn.last_insert_rowid(),
        name.to_string(),
        period,
        config,
    ))
}

pub fn get_student(conn: &Connection, id: i64) -> LedgerResult<Option<Student>> {
    let student = conn
        .query_row(
            &format!("SELECT {} FROM students WHERE id = ?1", STUDENT_COLUMNS),
            [id],
            student_from_row,
        )
        .optional()?;
    Ok(student)
}

pub fn find_student_by_name(conn: &Connection, name: &str) -> LedgerResult<Option<Student>> {
    let student = conn
        .query_row(
            &format!("SELECT {} FROM students WHERE name = ?1", STUDENT_COLUMNS),
            [name],
            student_from_row,
        )
        .optional()?;
    Ok(student)
}

pub fn all_students(conn: &Connection) -> LedgerResult<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM students ORDER BY id ASC",
        STUDENT_COLUMNS
    ))?;

    let students = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students)
}

/// Write back the mutable fields of a student snapshot
pub fn update_student(conn: &Connection, student: &Student) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE students
         SET available_credits = ?1,
             monthly_sent = ?2,
             last_reset_period = ?3,
             received_balance = ?4
         WHERE id = ?5",
        params![
            student.available_credits,
            student.monthly_sent,
            student.last_reset_period.to_string(),
            student.received_balance,
            student.id,
        ],
    )?;

    if changed == 0 {
        return Err(LedgerError::NotFound(format!("student {}", student.id)));
    }
    Ok(())
}

// ============================================================================
// RECOGNITIONS
// ============================================================================

fn recognition_from_row(row: &Row<'_>) -> rusqlite::Result<Recognition> {
    Ok(Recognition {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        amount: row.get(3)?,
        message: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

pub fn insert_recognition(
    conn: &Connection,
    sender_id: i64,
    recipient_id: i64,
    amount: i64,
    message: Option<&str>,
    created_at: DateTime<Utc>,
) -> LedgerResult<Recognition> {
    conn.execute(
        "INSERT INTO recognitions (sender_id, recipient_id, amount, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            sender_id,
            recipient_id,
            amount,
            message,
            format_timestamp(&created_at),
        ],
    )?;

    Ok(Recognition {
        id: conn.last_insert_rowid(),
        sender_id,
        recipient_id,
        amount,
        message: message.map(str::to_string),
        created_at,
    })
}

pub fn get_recognition(conn: &Connection, id: i64) -> LedgerResult<Option<Recognition>> {
    let recognition = conn
        .query_row(
            "SELECT id, sender_id, recipient_id, amount, message, created_at
             FROM recognitions WHERE id = ?1",
            [id],
            recognition_from_row,
        )
        .optional()?;
    Ok(recognition)
}

/// Newest first, each with its endorsement count
pub fn list_recognitions(
    conn: &Connection,
    filter: &RecognitionFilter,
    limit: usize,
) -> LedgerResult<Vec<RecognitionEntry>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.sender_id, r.recipient_id, r.amount, r.message, r.created_at,
                (SELECT COUNT(*) FROM endorsements e WHERE e.recognition_id = r.id)
         FROM recognitions r
         WHERE (?1 IS NULL OR r.sender_id = ?1)
           AND (?2 IS NULL OR r.recipient_id = ?2)
         ORDER BY r.created_at DESC, r.id DESC
         LIMIT ?3",
    )?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let entries = stmt
        .query_map(params![filter.sender_id, filter.recipient_id, limit], |row| {
            Ok(RecognitionEntry {
                recognition: recognition_from_row(row)?,
                endorsements: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

// ============================================================================
// ENDORSEMENTS
// ============================================================================

pub fn find_endorsement(
    conn: &Connection,
    recognition_id: i64,
    endorser_id: i64,
) -> LedgerResult<Option<Endorsement>> {
    let endorsement = conn
        .query_row(
            "SELECT id, recognition_id, endorser_id, created_at
             FROM endorsements WHERE recognition_id = ?1 AND endorser_id = ?2",
            params![recognition_id, endorser_id],
            |row| {
                Ok(Endorsement {
                    id: row.get(0)?,
                    recognition_id: row.get(1)?,
                    endorser_id: row.get(2)?,
                    created_at: timestamp_column(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(endorsement)
}

pub fn insert_endorsement(
    conn: &Connection,
    recognition_id: i64,
    endorser_id: i64,
    created_at: DateTime<Utc>,
) -> LedgerResult<Endorsement> {
    conn.execute(
        "INSERT INTO endorsements (recognition_id, endorser_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![recognition_id, endorser_id, format_timestamp(&created_at)],
    )?;

    Ok(Endorsement {
        id: conn.last_insert_rowid(),
        recognition_id,
        endorser_id,
        created_at,
    })
}

pub fn count_endorsements(conn: &Connection, recognition_id: i64) -> LedgerResult<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM endorsements WHERE recognition_id = ?1",
        [recognition_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// REDEMPTIONS
// ============================================================================

pub fn insert_redemption(
    conn: &Connection,
    student_id: i64,
    amount: i64,
    voucher_value: i64,
    created_at: DateTime<Utc>,
) -> LedgerResult<Redemption> {
    conn.execute(
        "INSERT INTO redemptions (student_id, amount, voucher_value, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![student_id, amount, voucher_value, format_timestamp(&created_at)],
    )?;

    Ok(Redemption {
        id: conn.last_insert_rowid(),
        student_id,
        amount,
        voucher_value,
        created_at,
    })
}

pub fn redemptions_for(conn: &Connection, student_id: i64) -> LedgerResult<Vec<Redemption>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, amount, voucher_value, created_at
         FROM redemptions
         WHERE student_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;

    let redemptions = stmt
        .query_map([student_id], |row| {
            Ok(Redemption {
                id: row.get(0)?,
                student_id: row.get(1)?,
                amount: row.get(2)?,
                voucher_value: row.get(3)?,
                created_at: timestamp_column(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(redemptions)
}

// ============================================================================
// LEADERBOARD AGGREGATION
// ============================================================================

/// Per-student totals over recognitions received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub student_id: i64,
    pub name: String,
    pub total_received: i64,
    pub recognition_count: i64,
    pub endorsement_count: i64,
}

/// Ranked by total received (desc), ties by student id (asc)
pub fn leaderboard_rows(conn: &Connection, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>> {
    let mut stmt = conn.prepare(
        "SELECT
            s.id,
            s.name,
            COALESCE(t.total_received, 0) AS total_received,
            COALESCE(t.recognition_count, 0) AS recognition_count,
            COALESCE(e.endorsement_count, 0) AS endorsement_count
         FROM students s
         LEFT JOIN (
            SELECT recipient_id,
                   SUM(amount) AS total_received,
                   COUNT(*) AS recognition_count
            FROM recognitions
            GROUP BY recipient_id
         ) t ON t.recipient_id = s.id
         LEFT JOIN (
            SELECT r.recipient_id, COUNT(en.id) AS endorsement_count
            FROM recognitions r
            JOIN endorsements en ON en.recognition_id = r.id
            GROUP BY r.recipient_id
         ) e ON e.recipient_id = s.id
         ORDER BY total_received DESC, s.id ASC
         LIMIT ?1",
    )?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt
        .query_map([limit], |row| {
            Ok(LeaderboardEntry {
                student_id: row.get(0)?,
                name: row.get(1)?,
                total_received: row.get(2)?,
                recognition_count: row.get(3)?,
                endorsement_count: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// EVENT LOG
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> LedgerResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> LedgerResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp_column(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
