use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored or submitted value outside a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{value}'")]
pub struct ParseEnumError {
    pub value: String,
}

fn parse_enum<T: Copy>(s: &str, all: &[T], name: fn(&T) -> &'static str) -> Result<T, ParseEnumError> {
    all.iter()
        .find(|v| name(v) == s)
        .copied()
        .ok_or_else(|| ParseEnumError { value: s.to_string() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Entrepreneur,
    Student,
    Investor,
}

impl UserType {
    pub const ALL: [UserType; 3] = [UserType::Entrepreneur, UserType::Student, UserType::Investor];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Entrepreneur => "entrepreneur",
            UserType::Student => "student",
            UserType::Investor => "investor",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Basic,
    Premium,
}

impl SubscriptionPlan {
    pub const ALL: [SubscriptionPlan; 3] =
        [SubscriptionPlan::Free, SubscriptionPlan::Basic, SubscriptionPlan::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Premium => "premium",
        }
    }
}

impl FromStr for SubscriptionPlan {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: SubscriptionPlan,
    pub expires_at: DateTime<Utc>,
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Bot,
}

impl MessageType {
    pub const ALL: [MessageType; 2] = [MessageType::User, MessageType::Bot];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Bot => "bot",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Classifier confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Assistant latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.intent.is_none() && self.confidence.is_none() && self.response_time.is_none()
    }
}

/// A persisted chat turn. `user_id` and `study_id` are weak references:
/// resolve them through the database lookups, never assume they still exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub session_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_shape() {
        let user = User {
            id: Uuid::nil(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            user_type: UserType::Student,
            avatar: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            subscription: Some(Subscription {
                plan: SubscriptionPlan::Premium,
                expires_at: DateTime::<Utc>::UNIX_EPOCH,
            }),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["userType"], "student");
        assert_eq!(json["subscription"]["plan"], "premium");
        assert!(json.get("avatar").is_none());
    }

    #[test]
    fn test_message_type_parsing() {
        assert_eq!("user".parse::<MessageType>().unwrap(), MessageType::User);
        assert_eq!("bot".parse::<MessageType>().unwrap(), MessageType::Bot);
        assert!("assistant".parse::<MessageType>().is_err());
        assert!("User".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_user_type_rejects_unknown() {
        assert_eq!("investor".parse::<UserType>().unwrap(), UserType::Investor);
        let err = "teacher".parse::<UserType>().unwrap_err();
        assert_eq!(err.value, "teacher");
    }
}
