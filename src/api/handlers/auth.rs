use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::{handlers::types::ApiResponse, middleware::auth::bearer_token, state::AppState},
    auth::AuthService,
    domain::DirectoryUser,
    error::{AppError, Result},
    repository::UserRepository,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: DirectoryUser,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    let user_repo = &state.service_context.user_repo;

    let password_hash = user_repo
        .password_hash_by_email(&req.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !AuthService::verify_password(&req.password, &password_hash).await? {
        return Err(AppError::Unauthorized);
    }

    let user = user_repo
        .find_by_email(&req.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active {
        return Err(AppError::Unauthorized);
    }

    let (_session, token) = state
        .service_context
        .auth_service
        .create_session(user.id, state.settings.auth.session_duration_hours)
        .await?;

    Ok(Json(ApiResponse::ok(LoginResponse { token, user })))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>> {
    if let Some(token) = bearer_token(&headers) {
        // An already-invalid token still logs out cleanly.
        let _ = state
            .service_context
            .auth_service
            .invalidate_session(token)
            .await;
    }

    Ok(Json(ApiResponse::message_only("Logged out")))
}
