//! SQLite conversation repository implementation.
//!
//! A session row holds the display history as JSON. Structured messages get
//! one row each in `conversation_messages`, keyed by position, so role,
//! content, and metadata survive a round trip in order. `update` rewrites the
//! whole session inside one writer transaction.

use agentry_core::repository::conversation::ConversationRepository;
use agentry_types::conversation::{
    ConversationMessage, ConversationSession, HistoryEntry, MessageRole,
};
use agentry_types::error::RepositoryError;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, Transaction};

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime};

/// SQLite-backed implementation of `ConversationRepository`.
#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for `conversation_sessions`.
struct SessionRow {
    session_id: String,
    config_id: String,
    history: String,
    created_at: String,
    updated_at: String,
    active: bool,
}

impl SessionRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            config_id: row.try_get("config_id")?,
            history: row.try_get("history")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            active: row.try_get("active")?,
        })
    }

    fn into_session(
        self,
        messages: Vec<ConversationMessage>,
    ) -> Result<ConversationSession, RepositoryError> {
        let history: Vec<HistoryEntry> = serde_json::from_str(&self.history)
            .map_err(|e| RepositoryError::Query(format!("invalid history JSON: {e}")))?;

        Ok(ConversationSession {
            session_id: self.session_id,
            config_id: self.config_id,
            messages,
            history,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            active: self.active,
        })
    }
}

fn message_from_row(row: &SqliteRow) -> Result<ConversationMessage, RepositoryError> {
    let role: String = row
        .try_get("role")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let metadata: String = row
        .try_get("metadata")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(ConversationMessage {
        role: role
            .parse::<MessageRole>()
            .map_err(RepositoryError::Query)?,
        content,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?,
        created_at: parse_datetime(&created_at)?,
    })
}

/// Load the structured messages of one session. Runs on the caller's
/// connection so it reads the same snapshot as the session row.
async fn load_messages(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<ConversationMessage>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT role, content, metadata, created_at FROM conversation_messages
         WHERE session_id = ? ORDER BY position ASC",
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| RepositoryError::Query(e.to_string()))?;

    rows.iter().map(message_from_row).collect()
}

async fn hydrate(
    conn: &mut SqliteConnection,
    row: &SqliteRow,
) -> Result<ConversationSession, RepositoryError> {
    let session_row =
        SessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
    let messages = load_messages(conn, &session_row.session_id).await?;
    session_row.into_session(messages)
}

async fn insert_messages(
    tx: &mut Transaction<'_, Sqlite>,
    session: &ConversationSession,
) -> Result<(), RepositoryError> {
    for (position, message) in session.messages.iter().enumerate() {
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_messages (session_id, position, role, content, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.session_id)
        .bind(position as i64)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(&metadata)
        .bind(format_datetime(&message.created_at))
        .execute(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    }
    Ok(())
}

fn encode_history(session: &ConversationSession) -> Result<String, RepositoryError> {
    serde_json::to_string(&session.history).map_err(|e| RepositoryError::Query(e.to_string()))
}

impl ConversationRepository for SqliteConversationRepository {
    async fn create(&self, session: &ConversationSession) -> Result<String, RepositoryError> {
        let history = encode_history(session)?;

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_sessions (session_id, config_id, history, created_at, updated_at, active)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.session_id)
        .bind(&session.config_id)
        .bind(&history)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .bind(session.active)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return RepositoryError::Conflict(format!(
                    "session '{}' already exists",
                    session.session_id
                ));
            }
            RepositoryError::Query(e.to_string())
        })?;

        insert_messages(&mut tx, session).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(session.session_id.clone())
    }

    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>, RepositoryError> {
        // Session row and message rows come from one read transaction.
        let mut tx = self
            .pool
            .reader
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM conversation_sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let session = match row {
            Some(row) => Some(hydrate(&mut *tx, &row).await?),
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(session)
    }

    async fn update(&self, session: &ConversationSession) -> Result<bool, RepositoryError> {
        let history = encode_history(session)?;

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE conversation_sessions SET config_id = ?, history = ?, updated_at = ?, active = ?
             WHERE session_id = ?",
        )
        .bind(&session.config_id)
        .bind(&history)
        .bind(format_datetime(&session.updated_at))
        .bind(session.active)
        .bind(&session.session_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM conversation_messages WHERE session_id = ?")
            .bind(&session.session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        insert_messages(&mut tx, session).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(true)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE conversation_sessions SET active = 0, updated_at = ? WHERE session_id = ?",
        )
        .bind(format_datetime(&chrono::Utc::now()))
        .bind(session_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge(&self, session_id: &str) -> Result<bool, RepositoryError> {
        // Messages go with the session via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM conversation_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        config_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let mut tx = self
            .pool
            .reader
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT * FROM conversation_sessions
             WHERE (?1 IS NULL OR config_id = ?1) AND (?2 = 0 OR active = 1)
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(config_id)
        .bind(active_only)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(hydrate(&mut *tx, row).await?);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(sessions)
    }

    async fn exists(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM conversation_sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn count(&self, active_only: bool) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversation_sessions WHERE (?1 = 0 OR active = 1)",
        )
        .bind(active_only)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u64)
    }
}
