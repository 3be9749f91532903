//! Database row types. These map directly to SQLite rows and stay distinct
//! from the etude-types API models so the storage layer can evolve on its own.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use etude_types::models::{
    ChatMessage, MessageMetadata, Study, Subscription, SubscriptionPlan, User,
};

pub struct UserRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub user_type: String,
    pub avatar: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_expires_at: Option<String>,
    pub created_at: String,
}

pub struct StudyRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
}

pub struct ChatMessageRow {
    pub id: String,
    pub user_id: Option<String>,
    pub session_id: String,
    pub message_type: String,
    pub content: String,
    pub study_id: Option<String>,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub response_time: Option<f64>,
    pub created_at: String,
}

/// Fixed-width RFC 3339 so lexical order in SQLite equals chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw).with_context(|| format!("Corrupt timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let subscription = match (row.subscription_plan, row.subscription_expires_at) {
            (Some(plan), Some(expires_at)) => Some(Subscription {
                plan: plan
                    .parse::<SubscriptionPlan>()
                    .with_context(|| format!("Corrupt subscription plan on user '{}'", row.id))?,
                expires_at: parse_timestamp(&expires_at)?,
            }),
            _ => None,
        };

        Ok(User {
            id: parse_id(&row.id)?,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            user_type: row
                .user_type
                .parse()
                .with_context(|| format!("Corrupt user_type on user '{}'", row.id))?,
            avatar: row.avatar,
            created_at: parse_timestamp(&row.created_at)?,
            subscription,
        })
    }
}

impl TryFrom<StudyRow> for Study {
    type Error = anyhow::Error;

    fn try_from(row: StudyRow) -> Result<Self> {
        Ok(Study {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            title: row.title,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = anyhow::Error;

    fn try_from(row: ChatMessageRow) -> Result<Self> {
        let metadata = MessageMetadata {
            intent: row.intent,
            confidence: row.confidence,
            response_time: row.response_time,
        };

        Ok(ChatMessage {
            user_id: row.user_id.as_deref().map(parse_id).transpose()?,
            session_id: row.session_id,
            message_type: row
                .message_type
                .parse()
                .with_context(|| format!("Corrupt type on message '{}'", row.id))?,
            content: row.content,
            study_id: row.study_id.as_deref().map(parse_id).transpose()?,
            metadata: (!metadata.is_empty()).then_some(metadata),
            created_at: parse_timestamp(&row.created_at)?,
            id: parse_id(&row.id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1);
        let (a, b) = (format_timestamp(early), format_timestamp(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(format_timestamp(parse_timestamp(&a).unwrap()), a);
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let row = ChatMessageRow {
            id: "not-a-uuid".into(),
            user_id: None,
            session_id: "s1".into(),
            message_type: "user".into(),
            content: "hi".into(),
            study_id: None,
            intent: None,
            confidence: None,
            response_time: None,
            created_at: format_timestamp(Utc::now()),
        };
        assert!(ChatMessage::try_from(row).is_err());
    }
}
