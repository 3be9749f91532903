pub mod auth;
pub mod chat;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod studies;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use etude_db::Database;

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::middleware::{optional_auth, require_auth};

/// All REST routes, unprefixed. The server nests them under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/chat/sessions/{session_id}/messages", get(chat::list_session_messages));

    let guest_routes = Router::new()
        .route("/chat/messages", post(chat::post_message))
        .layer(axum_middleware::from_fn_with_state(state.clone(), optional_auth));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/change-password", put(auth::change_password))
        .route("/chat/history", get(chat::list_my_messages))
        .route("/studies", post(studies::create_study))
        .route("/studies/{study_id}", get(studies::get_study))
        .route("/studies/{study_id}/messages", get(studies::list_study_messages))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(guest_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Run a blocking database call off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || f(&state.db)).await?;
    Ok(result?)
}
