use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use etude_db::models::{StudyRow, format_timestamp};
use etude_types::api::{Claims, CreateStudyRequest};
use etude_types::models::{ChatMessage, Study};

use crate::auth::AppState;
use crate::chat::{MessageQuery, into_messages};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::run_blocking;

const MAX_TITLE_CHARS: usize = 200;

pub async fn create_study(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateStudyRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::invalid("title", "title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::invalid(
            "title",
            format!("title exceeds maximum length of {MAX_TITLE_CHARS} characters"),
        ));
    }

    let row = StudyRow {
        id: Uuid::new_v4().to_string(),
        user_id: claims.sub.to_string(),
        title,
        created_at: format_timestamp(Utc::now()),
    };

    let study: Study = run_blocking(&state, move |db| {
        db.create_study(&row)?;
        row.try_into()
    })
    .await?;

    Ok((StatusCode::CREATED, Json(study)))
}

pub async fn get_study(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(study_id): ApiPath<Uuid>,
) -> ApiResult<Json<Study>> {
    Ok(Json(owned_study(&state, &claims, study_id).await?))
}

/// Every message linked to one of the caller's studies, oldest first.
pub async fn list_study_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(study_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    owned_study(&state, &claims, study_id).await?;

    let limit = query.clamped();
    let rows = run_blocking(&state, move |db| db.get_messages_for_study(&study_id.to_string(), limit)).await?;

    let mut messages = into_messages(rows);
    messages.sort_by_key(|m| m.created_at);
    Ok(Json(messages))
}

/// Look up a study through its id. Someone else's study is reported as
/// missing so ids cannot be probed.
async fn owned_study(state: &AppState, claims: &Claims, study_id: Uuid) -> ApiResult<Study> {
    let row = run_blocking(state, move |db| db.get_study_by_id(&study_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("study {study_id}")))?;

    let study: Study = row.try_into()?;
    if study.user_id != claims.sub {
        return Err(ApiError::not_found(format!("study {study_id}")));
    }
    Ok(study)
}
