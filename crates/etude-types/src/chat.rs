//! Validation contract for chat messages.
//!
//! A [`ChatMessageDraft`] is whatever a caller submitted. The only way to get a
//! [`NewChatMessage`] (the thing storage accepts) is [`ChatMessageDraft::validate`],
//! so an invalid message can never reach a write.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MessageMetadata, MessageType};

pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} exceeds maximum length of {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} out of range: must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("{field} has invalid value '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

impl ValidationError {
    /// Name of the offending field, in wire (camelCase) form.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Negative { field }
            | ValidationError::InvalidValue { field, .. } => *field,
        }
    }
}

/// Candidate message as submitted over the wire. Missing fields deserialize to
/// empty values so that validation, not the JSON decoder, reports them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDraft {
    #[serde(default)]
    pub session_id: String,
    #[serde(default, rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub study_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

/// A message that passed validation. Fields are read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    user_id: Option<Uuid>,
    session_id: String,
    message_type: MessageType,
    content: String,
    study_id: Option<Uuid>,
    metadata: Option<MessageMetadata>,
}

impl ChatMessageDraft {
    pub fn new(session_id: impl Into<String>, message_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message_type: message_type.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn study(mut self, study_id: Uuid) -> Self {
        self.study_id = Some(study_id);
        self
    }

    pub fn metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check every invariant and return the first violation found.
    pub fn validate(self) -> Result<NewChatMessage, ValidationError> {
        if self.session_id.trim().is_empty() {
            return Err(ValidationError::Missing { field: "sessionId" });
        }

        if self.message_type.is_empty() {
            return Err(ValidationError::Missing { field: "type" });
        }
        let message_type: MessageType =
            self.message_type
                .parse()
                .map_err(|_| ValidationError::InvalidValue {
                    field: "type",
                    value: self.message_type.clone(),
                })?;

        if self.content.trim().is_empty() {
            return Err(ValidationError::Missing { field: "content" });
        }
        let chars = self.content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(ValidationError::TooLong {
                field: "content",
                max: MAX_CONTENT_CHARS,
                actual: chars,
            });
        }

        let metadata = match self.metadata {
            Some(meta) => {
                validate_metadata(&meta)?;
                // An all-empty object is stored as no metadata at all
                (!meta.is_empty()).then_some(meta)
            }
            None => None,
        };

        Ok(NewChatMessage {
            user_id: None,
            session_id: self.session_id,
            message_type,
            content: self.content,
            study_id: self.study_id,
            metadata,
        })
    }
}

fn validate_metadata(meta: &MessageMetadata) -> Result<(), ValidationError> {
    if let Some(confidence) = meta.confidence {
        // NaN fails the range check as well
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::OutOfRange {
                field: "metadata.confidence",
                min: 0.0,
                max: 1.0,
            });
        }
    }

    if let Some(response_time) = meta.response_time {
        if !(response_time >= 0.0 && response_time.is_finite()) {
            return Err(ValidationError::Negative {
                field: "metadata.responseTime",
            });
        }
    }

    Ok(())
}

impl NewChatMessage {
    /// Attribute the message to an authenticated user. Guest messages skip this.
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn study_id(&self) -> Option<Uuid> {
        self.study_id
    }

    pub fn metadata(&self) -> Option<&MessageMetadata> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(content: &str) -> ChatMessageDraft {
        ChatMessageDraft::new("s1", "user", content)
    }

    fn with_meta(confidence: Option<f64>, response_time: Option<f64>) -> ChatMessageDraft {
        draft("hello").metadata(MessageMetadata {
            intent: Some("greeting".into()),
            confidence,
            response_time,
        })
    }

    #[test]
    fn test_content_length_bounds() {
        assert!(draft("a").validate().is_ok());
        assert!(draft(&"a".repeat(MAX_CONTENT_CHARS)).validate().is_ok());

        let err = draft("").validate().unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "content" });

        let err = draft(&"a".repeat(MAX_CONTENT_CHARS + 1)).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooLong {
                field: "content",
                max: 2000,
                actual: 2001
            }
        );
        assert_eq!(err.field(), "content");
        assert!(err.to_string().contains("exceeds maximum length"));
    }

    #[test]
    fn test_content_counts_characters_not_bytes() {
        // 2000 two-byte characters is 4000 bytes but still within the limit
        let accents = "é".repeat(MAX_CONTENT_CHARS);
        assert!(draft(&accents).validate().is_ok());
    }

    #[test]
    fn test_whitespace_only_content_is_empty() {
        let err = draft("   \n").validate().unwrap_err();
        assert_eq!(err.field(), "content");
    }

    #[test]
    fn test_type_is_closed_set() {
        assert_eq!(
            ChatMessageDraft::new("s1", "bot", "hi").validate().unwrap().message_type(),
            MessageType::Bot
        );

        for bad in ["assistant", "system", "USER", " bot"] {
            let err = ChatMessageDraft::new("s1", bad, "hi").validate().unwrap_err();
            assert_eq!(err.field(), "type", "value {bad:?} should be rejected");
        }

        let err = ChatMessageDraft::new("s1", "", "hi").validate().unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "type" });
    }

    #[test]
    fn test_session_id_required() {
        let err = ChatMessageDraft::new("", "user", "hi").validate().unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "sessionId" });
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(with_meta(Some(0.0), None).validate().is_ok());
        assert!(with_meta(Some(1.0), None).validate().is_ok());
        assert!(with_meta(Some(0.42), None).validate().is_ok());

        for bad in [-0.01, 1.01, f64::NAN] {
            let err = with_meta(Some(bad), None).validate().unwrap_err();
            assert_eq!(err.field(), "metadata.confidence");
        }
    }

    #[test]
    fn test_response_time_bounds() {
        assert!(with_meta(None, Some(0.0)).validate().is_ok());
        assert!(with_meta(None, Some(1250.5)).validate().is_ok());

        for bad in [-1.0, f64::NAN] {
            let err = with_meta(None, Some(bad)).validate().unwrap_err();
            assert_eq!(err.field(), "metadata.responseTime");
        }
    }

    #[test]
    fn test_empty_metadata_is_dropped() {
        let msg = draft("hi").metadata(MessageMetadata::default()).validate().unwrap();
        assert!(msg.metadata().is_none());
    }

    #[test]
    fn test_draft_from_json_reports_missing_fields() {
        let draft: ChatMessageDraft = serde_json::from_str(r#"{"sessionId":"s1","type":"user"}"#).unwrap();
        assert_eq!(draft.validate().unwrap_err().field(), "content");
    }
}
