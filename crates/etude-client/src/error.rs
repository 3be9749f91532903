//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

use etude_types::api::ErrorBody;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure or a response body that could not be decoded.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status. `body` is passed
    /// through untouched.
    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    /// The token store could not be written.
    #[error("token store error: {0}")]
    Store(#[from] std::io::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            ClientError::Store(_) => None,
        }
    }

    /// Structured error body, when the server sent one.
    pub fn error_body(&self) -> Option<ErrorBody> {
        match self {
            ClientError::Api { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}
