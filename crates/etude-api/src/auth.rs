use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use etude_db::Database;
use etude_db::models::{UserRow, format_timestamp};
use etude_types::api::{
    AuthResponse, ChangePasswordData, Claims, LoginCredentials, RegisterData, UpdateProfileData,
};
use etude_types::models::User;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::run_blocking;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_CHARS: usize = 50;
const MAX_AVATAR_CHARS: usize = 2048;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterData>,
) -> ApiResult<impl IntoResponse> {
    check_name("firstName", &req.first_name)?;
    check_name("lastName", &req.last_name)?;
    let email = normalize_email(&req.email)?;
    check_password("password", &req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let row = UserRow {
        id: user_id.to_string(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        email,
        password: password_hash,
        user_type: req.user_type.as_str().to_string(),
        avatar: None,
        subscription_plan: None,
        subscription_expires_at: None,
        created_at: format_timestamp(Utc::now()),
    };

    let user = run_blocking(&state, move |db| -> anyhow::Result<ApiResult<User>> {
        if !db.create_user(&row)? {
            return Ok(Err(ApiError::conflict("email already registered")));
        }
        Ok(Ok(row.try_into()?))
    })
    .await??;

    let token = create_token(&state, user.id, &user.email)?;
    info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginCredentials>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let row = run_blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;

    verify_password(&req.password, &row.password)?;

    let user: User = row.try_into()?;
    let token = create_token(&state, user.id, &user.email)?;

    Ok(Json(AuthResponse { user, token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<User>> {
    let id = claims.sub.to_string();
    let row = run_blocking(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("user no longer exists"))?;

    Ok(Json(row.try_into()?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(mut req): ApiJson<UpdateProfileData>,
) -> ApiResult<Json<User>> {
    if let Some(first_name) = req.first_name.as_mut() {
        check_name("firstName", first_name)?;
        *first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = req.last_name.as_mut() {
        check_name("lastName", last_name)?;
        *last_name = last_name.trim().to_string();
    }
    if let Some(avatar) = &req.avatar {
        if avatar.chars().count() > MAX_AVATAR_CHARS {
            return Err(ApiError::invalid("avatar", "avatar URL is too long"));
        }
    }

    let id = claims.sub.to_string();
    let row = run_blocking(&state, move |db| db.update_user_profile(&id, &req))
        .await?
        .ok_or_else(|| ApiError::not_found("user no longer exists"))?;

    Ok(Json(row.try_into()?))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ChangePasswordData>,
) -> ApiResult<StatusCode> {
    check_password("newPassword", &req.new_password)?;

    let id = claims.sub.to_string();
    let row = run_blocking(&state, {
        let id = id.clone();
        move |db| db.get_user_by_id(&id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("user no longer exists"))?;

    verify_password(&req.current_password, &row.password)
        .map_err(|_| ApiError::invalid("currentPassword", "current password is incorrect"))?;

    let new_hash = hash_password(&req.new_password)?;
    run_blocking(&state, move |db| db.update_user_password(&id, &new_hash)).await?;
    info!("Password changed for user {}", claims.sub);

    Ok(StatusCode::NO_CONTENT)
}

pub fn create_token(state: &AppStateInner, user_id: Uuid, email: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + state.token_ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::from(anyhow::Error::from(e)))
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::from(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> ApiResult<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::from(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::unauthorized("invalid email or password"))
}

fn check_name(field: &'static str, value: &str) -> ApiResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid(field, format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::invalid(
            field,
            format!("{field} exceeds maximum length of {MAX_NAME_CHARS} characters"),
        ));
    }
    Ok(())
}

fn check_password(field: &'static str, value: &str) -> ApiResult<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid(
            field,
            format!("{field} must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::invalid("email", "email is not a valid address"));
    }
    Ok(email)
}
