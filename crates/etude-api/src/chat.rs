use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;

use etude_db::models::ChatMessageRow;
use etude_types::api::Claims;
use etude_types::chat::ChatMessageDraft;
use etude_types::models::ChatMessage;

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::MaybeClaims;
use crate::run_blocking;

const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

impl MessageQuery {
    pub fn clamped(&self) -> u32 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

/// Store one chat turn. Authenticated callers own their messages; guests
/// post anonymously under their session id.
pub async fn post_message(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    ApiJson(draft): ApiJson<ChatMessageDraft>,
) -> ApiResult<impl IntoResponse> {
    let mut message = draft.validate()?;
    if let Some(claims) = claims {
        message = message.with_user(claims.sub);
    }

    let stored = run_blocking(&state, move |db| db.insert_chat_message(&message)).await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// The caller's most recent messages, newest first.
pub async fn list_my_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let user_id = claims.sub.to_string();
    let limit = query.clamped();

    let rows = run_blocking(&state, move |db| db.get_messages_for_user(&user_id, limit)).await?;
    Ok(Json(into_messages(rows)))
}

/// Chronological replay of one conversation.
pub async fn list_session_messages(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let limit = query.clamped();

    let rows = run_blocking(&state, move |db| db.get_messages_for_session(&session_id, limit)).await?;
    Ok(Json(into_messages(rows)))
}

/// Corrupt rows are logged and skipped rather than failing the whole listing.
pub(crate) fn into_messages(rows: Vec<ChatMessageRow>) -> Vec<ChatMessage> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            ChatMessage::try_from(row)
                .map_err(|e| warn!("Skipping corrupt chat message '{}': {:#}", id, e))
                .ok()
        })
        .collect()
}
