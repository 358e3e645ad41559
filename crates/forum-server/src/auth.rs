use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::error;

use forum_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse, UserResponse};
use forum_types::models::User;

use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !req.email.contains('@') || req.email.len() > 254 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Username and email must both be free
    let store = state.store.clone();
    let username = req.username.clone();
    let email = req.email.clone();
    let taken = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        Ok(store.get_user_by_username(&username)?.is_some()
            || store.get_user_by_email(&email)?.is_some())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if taken {
        return Err(StatusCode::CONFLICT);
    }

    let password_hash = state
        .auth
        .hash_password(&req.password)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = User {
        username: req.username,
        email: req.email,
        password_hash,
        created_at: Utc::now(),
        is_active: true,
    };

    let store = state.store.clone();
    let stored = user.clone();
    tokio::task::spawn_blocking(move || store.create_user(&stored))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        // A lost race on the unique constraints lands here.
        .map_err(|_| StatusCode::CONFLICT)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || store.get_user_by_username(&username))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state
        .auth
        .verify_password(&req.password, &user.password_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let access_token = state
        .auth
        .issue_token(&user.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, StatusCode> {
    let store = state.store.clone();
    let user = tokio::task::spawn_blocking(move || store.get_user_by_username(&claims.sub))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !user.is_active {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Json(UserResponse::from(user)))
}
