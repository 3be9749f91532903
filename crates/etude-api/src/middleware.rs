use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use etude_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Claims of the caller on routes where authentication is optional.
/// `None` means a guest.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<Claims>);

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let claims = verify_token(&state.jwt_secret, token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Like [`require_auth`] but lets requests without a token through as guests.
/// A token that is present but invalid is still rejected.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = match bearer_token(req.headers())? {
        Some(token) => Some(verify_token(&state.jwt_secret, token)?),
        None => None,
    };

    req.extensions_mut().insert(MaybeClaims(claims));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("malformed Authorization header"))?;
    Ok(Some(token))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| ApiError::unauthorized("invalid or expired token"))
}
