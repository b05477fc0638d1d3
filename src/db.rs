use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::Result;
use crate::models::{
    DiagnosticAnswer, DiagnosticSession, DiagnosticStatus, FlashcardProgress, KnowledgeState,
    MasteryLevel, ReviewRecord,
};
use crate::state::LearnerState;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_states (
                topic_id TEXT PRIMARY KEY,
                score INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                correct_answers INTEGER NOT NULL DEFAULT 0,
                total_answers INTEGER NOT NULL DEFAULT 0,
                mastery_level TEXT NOT NULL DEFAULT 'unknown'
                    CHECK(mastery_level IN ('unknown', 'struggling', 'learning', 'mastered')),
                last_attempt_at TEXT
            );

            CREATE TABLE IF NOT EXISTS flashcard_progress (
                card_id TEXT PRIMARY KEY,
                topic_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval INTEGER NOT NULL DEFAULT 0,
                repetitions INTEGER NOT NULL DEFAULT 0,
                next_review_date TEXT NOT NULL,
                last_review_date TEXT
            );

            CREATE TABLE IF NOT EXISTS review_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                card_id TEXT NOT NULL,
                reviewed_on TEXT NOT NULL,
                quality INTEGER NOT NULL CHECK(quality BETWEEN 0 AND 5),
                interval INTEGER NOT NULL,
                FOREIGN KEY (card_id) REFERENCES flashcard_progress(card_id) ON DELETE CASCADE
            );

            -- Completed diagnostics are kept as history; at most one is in progress
            CREATE TABLE IF NOT EXISTS diagnostic_sessions (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                status TEXT NOT NULL CHECK(status IN ('in-progress', 'completed')),
                answers TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX IF NOT EXISTS idx_progress_next_review ON flashcard_progress(next_review_date);
            CREATE INDEX IF NOT EXISTS idx_progress_topic ON flashcard_progress(topic_id);
            CREATE INDEX IF NOT EXISTS idx_history_card ON review_history(card_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_started ON diagnostic_sessions(started_at);
            "#,
        )?;
        Ok(())
    }

    /// Read the whole learner snapshot.
    pub fn load_snapshot(&self) -> Result<LearnerState> {
        let mut state = LearnerState {
            knowledge_states: self.load_knowledge_states()?,
            flashcard_progress: self.load_flashcard_progress()?,
            diagnostic_session: self.latest_diagnostic()?,
        };
        state.normalize()?;

        info!(
            topics = state.knowledge_states.len(),
            cards = state.flashcard_progress.len(),
            "snapshot loaded"
        );
        Ok(state)
    }

    /// Replace the stored snapshot with `state` in one transaction.
    pub fn save_snapshot(&self, state: &LearnerState) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM knowledge_states", [])?;
        for k in state.knowledge_states.values() {
            tx.execute(
                r#"
                INSERT INTO knowledge_states
                    (topic_id, score, attempts, correct_answers, total_answers, mastery_level, last_attempt_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    k.topic_id,
                    k.score,
                    k.attempts,
                    k.correct_answers,
                    k.total_answers,
                    k.mastery_level.as_str(),
                    k.last_attempt_at.map(|t| t.to_rfc3339()),
                ],
            )?;
        }

        tx.execute("DELETE FROM review_history", [])?;
        tx.execute("DELETE FROM flashcard_progress", [])?;
        for p in state.flashcard_progress.values() {
            tx.execute(
                r#"
                INSERT INTO flashcard_progress
                    (card_id, topic_id, subject_id, ease_factor, interval, repetitions, next_review_date, last_review_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    p.card_id,
                    p.topic_id,
                    p.subject_id,
                    p.ease_factor,
                    p.interval,
                    p.repetitions,
                    format_date(p.next_review_date),
                    p.last_review_date.map(format_date),
                ],
            )?;
            for r in &p.review_history {
                tx.execute(
                    "INSERT INTO review_history (card_id, reviewed_on, quality, interval) VALUES (?1, ?2, ?3, ?4)",
                    params![p.card_id, format_date(r.date), r.quality, r.interval],
                )?;
            }
        }

        // An abandoned in-progress session disappears; completed ones stay
        let current_id = state.diagnostic_session.as_ref().map(|s| s.id.clone());
        tx.execute(
            "DELETE FROM diagnostic_sessions WHERE status = 'in-progress' AND id IS NOT ?1",
            params![current_id],
        )?;
        if let Some(session) = &state.diagnostic_session {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO diagnostic_sessions
                    (id, subject_id, started_at, completed_at, status, answers)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    session.id,
                    session.subject_id,
                    session.started_at.to_rfc3339(),
                    session.completed_at.map(|t| t.to_rfc3339()),
                    session.status.as_str(),
                    serde_json::to_string(&session.answers)?,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            topics = state.knowledge_states.len(),
            cards = state.flashcard_progress.len(),
            "snapshot saved"
        );
        Ok(())
    }

    fn load_knowledge_states(&self) -> Result<BTreeMap<String, KnowledgeState>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT topic_id, score, attempts, correct_answers, total_answers, mastery_level, last_attempt_at
            FROM knowledge_states
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let level: String = row.get(5)?;
            let last_attempt_at: Option<String> = row.get(6)?;
            Ok(KnowledgeState {
                topic_id: row.get(0)?,
                score: row.get(1)?,
                attempts: row.get(2)?,
                correct_answers: row.get(3)?,
                total_answers: row.get(4)?,
                mastery_level: MasteryLevel::from_str(&level).unwrap_or(MasteryLevel::Unknown),
                last_attempt_at: last_attempt_at
                    .as_deref()
                    .map(|s| parse_timestamp(6, s))
                    .transpose()?,
            })
        })?;

        let mut states = BTreeMap::new();
        for state in rows {
            let state = state?;
            states.insert(state.topic_id.clone(), state);
        }
        Ok(states)
    }

    fn load_flashcard_progress(&self) -> Result<BTreeMap<String, FlashcardProgress>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT card_id, topic_id, subject_id, ease_factor, interval, repetitions,
                   next_review_date, last_review_date
            FROM flashcard_progress
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let next: String = row.get(6)?;
            let last: Option<String> = row.get(7)?;
            Ok(FlashcardProgress {
                card_id: row.get(0)?,
                topic_id: row.get(1)?,
                subject_id: row.get(2)?,
                ease_factor: row.get(3)?,
                interval: row.get(4)?,
                repetitions: row.get(5)?,
                next_review_date: parse_date(6, &next)?,
                last_review_date: last.as_deref().map(|s| parse_date(7, s)).transpose()?,
                review_history: Vec::new(),
            })
        })?;

        let mut cards = BTreeMap::new();
        for card in rows {
            let card = card?;
            cards.insert(card.card_id.clone(), card);
        }

        let mut stmt = self.conn.prepare(
            "SELECT card_id, reviewed_on, quality, interval FROM review_history ORDER BY id ASC",
        )?;
        let history = stmt.query_map([], |row| {
            let card_id: String = row.get(0)?;
            let date: String = row.get(1)?;
            Ok((
                card_id,
                ReviewRecord {
                    date: parse_date(1, &date)?,
                    quality: row.get(2)?,
                    interval: row.get(3)?,
                },
            ))
        })?;
        for entry in history {
            let (card_id, record) = entry?;
            if let Some(card) = cards.get_mut(&card_id) {
                card.review_history.push(record);
            }
        }

        Ok(cards)
    }

    fn latest_diagnostic(&self) -> Result<Option<DiagnosticSession>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, subject_id, started_at, completed_at, status, answers
                FROM diagnostic_sessions
                ORDER BY started_at DESC
                LIMIT 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, subject_id, started_at, completed_at, status, answers)) = row else {
            return Ok(None);
        };

        let answers: Vec<DiagnosticAnswer> = serde_json::from_str(&answers)?;
        Ok(Some(DiagnosticSession {
            id,
            subject_id,
            started_at: parse_timestamp(2, &started_at)?,
            completed_at: completed_at
                .as_deref()
                .map(|s| parse_timestamp(3, s))
                .transpose()?,
            answers,
            status: DiagnosticStatus::from_str(&status).unwrap_or(DiagnosticStatus::Completed),
        }))
    }

    pub fn completed_diagnostics(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM diagnostic_sessions WHERE status = 'completed'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
