use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use etude_types::api::UpdateProfileData;
use etude_types::chat::NewChatMessage;
use etude_types::models::ChatMessage;

use crate::Database;
use crate::models::{ChatMessageRow, StudyRow, UserRow, format_timestamp};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password, user_type, avatar, \
     subscription_plan, subscription_expires_at, created_at";

const MESSAGE_COLUMNS: &str = "id, user_id, session_id, type, content, study_id, intent, \
     confidence, response_time, created_at";

// Each access pattern has exactly one index that serves both the filter and
// the ordering; see migrations.rs.
pub(crate) const MESSAGES_BY_USER: &str = "WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2";
pub(crate) const MESSAGES_BY_SESSION: &str = "WHERE session_id = ?1 ORDER BY created_at ASC LIMIT ?2";
pub(crate) const MESSAGES_BY_STUDY: &str = "WHERE study_id = ?1 LIMIT ?2";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` without writing when the email is
    /// already registered; the check and the insert are one statement.
    pub fn create_user(&self, user: &UserRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, first_name, last_name, email, password, user_type, avatar, \
                 subscription_plan, subscription_expires_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT DO NOTHING",
                rusqlite::params![
                    user.id,
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.password,
                    user.user_type,
                    user.avatar,
                    user.subscription_plan,
                    user.subscription_expires_at,
                    user.created_at,
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Apply a partial profile update and return the updated row, or `None`
    /// if the user no longer exists.
    pub fn update_user_profile(&self, id: &str, update: &UpdateProfileData) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    first_name = COALESCE(?2, first_name),
                    last_name  = COALESCE(?3, last_name),
                    avatar     = COALESCE(?4, avatar),
                    user_type  = COALESCE(?5, user_type)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.first_name,
                    update.last_name,
                    update.avatar,
                    update.user_type.map(|t| t.as_str()),
                ],
            )?;

            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", id)
        })
    }

    /// Returns false if no such user exists.
    pub fn update_user_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Studies --

    pub fn create_study(&self, study: &StudyRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO studies (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&study.id, &study.user_id, &study.title, &study.created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_study_by_id(&self, id: &str) -> Result<Option<StudyRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, title, created_at FROM studies WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(StudyRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            title: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Chat messages --

    /// Persist a validated message. `created_at` is assigned here and the row
    /// is written with a single statement, so it lands whole or not at all.
    pub fn insert_chat_message(&self, msg: &NewChatMessage) -> Result<ChatMessage> {
        self.insert_chat_message_at(msg, Utc::now())
    }

    pub(crate) fn insert_chat_message_at(
        &self,
        msg: &NewChatMessage,
        created_at: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        let id = Uuid::new_v4();
        let created_at_raw = format_timestamp(created_at);
        let metadata = msg.metadata();

        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("INSERT INTO chat_messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                rusqlite::params![
                    id.to_string(),
                    msg.user_id().map(|u| u.to_string()),
                    msg.session_id(),
                    msg.message_type().as_str(),
                    msg.content(),
                    msg.study_id().map(|s| s.to_string()),
                    metadata.and_then(|m| m.intent.as_deref()),
                    metadata.and_then(|m| m.confidence),
                    metadata.and_then(|m| m.response_time),
                    created_at_raw,
                ],
            )?;
            Ok(())
        })?;

        debug!("Stored chat message {} in session {}", id, msg.session_id());

        ChatMessageRow {
            id: id.to_string(),
            user_id: msg.user_id().map(|u| u.to_string()),
            session_id: msg.session_id().to_string(),
            message_type: msg.message_type().as_str().to_string(),
            content: msg.content().to_string(),
            study_id: msg.study_id().map(|s| s.to_string()),
            intent: metadata.and_then(|m| m.intent.clone()),
            confidence: metadata.and_then(|m| m.confidence),
            response_time: metadata.and_then(|m| m.response_time),
            created_at: created_at_raw,
        }
        .try_into()
    }

    /// Most recent messages for a user, newest first.
    pub fn get_messages_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| query_messages(conn, MESSAGES_BY_USER, user_id, limit))
    }

    /// A session replayed in chronological order.
    pub fn get_messages_for_session(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| query_messages(conn, MESSAGES_BY_SESSION, session_id, limit))
    }

    /// Every message tied to a study, in index order. Callers that need a
    /// specific order sort the (small) result themselves.
    pub fn get_messages_for_study(&self, study_id: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| query_messages(conn, MESSAGES_BY_STUDY, study_id, limit))
    }
}

fn query_user(conn: &Connection, column: &'static str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                password: row.get(4)?,
                user_type: row.get(5)?,
                avatar: row.get(6)?,
                subscription_plan: row.get(7)?,
                subscription_expires_at: row.get(8)?,
                created_at: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection, clause: &str, key: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages {clause}"))?;

    let rows = stmt
        .query_map(rusqlite::params![key, limit], message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<ChatMessageRow> {
    Ok(ChatMessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        message_type: row.get(3)?,
        content: row.get(4)?,
        study_id: row.get(5)?,
        intent: row.get(6)?,
        confidence: row.get(7)?,
        response_time: row.get(8)?,
        created_at: row.get(9)?,
    })
}
