use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{handlers::types::ApiResponse, middleware::auth::CurrentUser, state::AppState},
    domain::Attachment,
    error::{AppError, Result},
    service::{AttachmentListing, UploadFile},
};

pub async fn upload(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<Attachment>>>> {
    let max_files = state.settings.storage.max_files_per_request;
    let mut files: Vec<UploadFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        if files.len() >= max_files {
            return Err(AppError::Validation(format!(
                "At most {} files per request",
                max_files
            )));
        }
        let original_name = field
            .file_name()
            .map(str::to_owned)
            .unwrap_or_else(|| "attachment".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Unreadable file: {}", e)))?;
        files.push(UploadFile {
            original_name,
            data: data.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::Validation("No files in request".to_string()));
    }

    let outcome = state
        .service_context
        .attachment_service
        .upload(&current.user, id, files)
        .await?;

    let mut response = ApiResponse::with_message(outcome.added, "Attachments uploaded");
    if !outcome.failed.is_empty() {
        response.upload_errors = Some(outcome.failed);
    }
    if !outcome.duplicates.is_empty() {
        response.duplicates = Some(outcome.duplicates);
    }

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ListAttachmentsQuery {
    pub include_deleted: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListAttachmentsQuery>,
) -> Result<Json<ApiResponse<AttachmentListing>>> {
    let listing = state
        .service_context
        .attachment_service
        .list(&current.user, id, query.include_deleted.unwrap_or(false))
        .await?;

    Ok(Json(ApiResponse::ok(listing)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAttachmentQuery {
    pub permanent: Option<bool>,
}

/// Soft delete by default; `?permanent=true` removes the blob and the
/// record for good.
pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<DeleteAttachmentQuery>,
) -> Result<Json<ApiResponse<Attachment>>> {
    let service = &state.service_context.attachment_service;

    if query.permanent.unwrap_or(false) {
        service.hard_delete(&current.user, id, attachment_id).await?;
        return Ok(Json(ApiResponse::message_only(
            "Attachment permanently deleted",
        )));
    }

    let attachment = service.soft_delete(&current.user, id, attachment_id).await?;
    Ok(Json(ApiResponse::with_message(
        attachment,
        "Attachment deleted",
    )))
}

pub async fn restore(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Attachment>>> {
    let attachment = state
        .service_context
        .attachment_service
        .restore(&current.user, id, attachment_id)
        .await?;

    Ok(Json(ApiResponse::with_message(
        attachment,
        "Attachment restored",
    )))
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

pub async fn set_tag(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<TagRequest>,
) -> Result<Json<ApiResponse<Attachment>>> {
    let attachment = state
        .service_context
        .attachment_service
        .set_tag(&current.user, id, attachment_id, &request.tag)
        .await?;

    Ok(Json(ApiResponse::ok(attachment)))
}
