use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{handlers::types::ApiResponse, middleware::auth::CurrentUser, state::AppState},
    domain::{Comment, Reaction},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub body: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddCommentRequest>,
) -> Result<Json<ApiResponse<Comment>>> {
    let comment = state
        .service_context
        .engagement_service
        .add_comment(&current.user, id, request.body)
        .await?;

    Ok(Json(ApiResponse::ok(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>> {
    state
        .service_context
        .engagement_service
        .delete_comment(&current.user, id, comment_id)
        .await?;

    Ok(Json(ApiResponse::message_only("Comment deleted")))
}

#[derive(Debug, Deserialize)]
pub struct AddReactionRequest {
    pub emoji: String,
}

pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddReactionRequest>,
) -> Result<Json<ApiResponse<Vec<Reaction>>>> {
    let reactions = state
        .service_context
        .engagement_service
        .add_reaction(&current.user, id, &request.emoji)
        .await?;

    Ok(Json(ApiResponse::ok(reactions)))
}

/// The emoji arrives percent-encoded in the path; axum decodes it.
pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, emoji)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<Vec<Reaction>>>> {
    let reactions = state
        .service_context
        .engagement_service
        .remove_reaction(&current.user, id, &emoji)
        .await?;

    Ok(Json(ApiResponse::ok(reactions)))
}
