use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    api::{handlers::types::ApiResponse, middleware::auth::CurrentUser, state::AppState},
    domain::{Announcement, CreateAnnouncementRequest, DurationUnit, LastFor, UpdateAnnouncementRequest},
    error::{AppError, Result},
    repository::{AnnouncementFilter, SortOrder},
    service::UploadFile,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub category: Option<String>,
    pub is_archived: Option<bool>,
    pub search: Option<String>,
}

impl ListQuery {
    fn to_filter(&self) -> Result<AnnouncementFilter> {
        let sort = match self.sort.as_deref() {
            None | Some("newest") => SortOrder::Newest,
            Some("oldest") => SortOrder::Oldest,
            Some("expiring") => SortOrder::Expiring,
            Some(other) => {
                return Err(AppError::Validation(format!("Unknown sort order: {}", other)))
            }
        };

        Ok(AnnouncementFilter {
            category: self.category.clone(),
            is_archived: self.is_archived,
            search: self.search.clone(),
            sort,
        })
    }

    /// Cache key: every filter dimension participates, so distinct
    /// queries never share a slot.
    fn cache_key(&self) -> String {
        format!(
            "sort={}&category={}&is_archived={}&search={}",
            self.sort.as_deref().unwrap_or("newest"),
            self.category.as_deref().unwrap_or(""),
            self.is_archived.map(|b| b.to_string()).unwrap_or_default(),
            self.search.as_deref().unwrap_or(""),
        )
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let cache = state.service_context.fanout.cache();
    let key = query.cache_key();

    if let Some(cached) = cache.get_list(&key).await {
        return Ok(Json(ApiResponse::ok(cached)));
    }

    let filter = query.to_filter()?;
    let announcements = state
        .service_context
        .announcement_service
        .list(&filter)
        .await?;

    let value = serde_json::to_value(&announcements)
        .map_err(|e| AppError::Internal(format!("Serialization failed: {}", e)))?;
    cache.put_list(key, value.clone()).await;

    Ok(Json(ApiResponse::ok(value)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>> {
    let service = &state.service_context.announcement_service;

    // Reads always register, even on a cache hit; the receipt table
    // keeps repeats cheap.
    service.mark_read(&current.user, id).await?;

    let cache = state.service_context.fanout.cache();
    if let Some(cached) = cache.get_entry(id).await {
        return Ok(Json(ApiResponse::ok(cached)));
    }

    let announcement = service.fetch(id).await?;
    let value = serde_json::to_value(&announcement)
        .map_err(|e| AppError::Internal(format!("Serialization failed: {}", e)))?;
    cache.put_entry(id, value.clone()).await;

    Ok(Json(ApiResponse::ok(value)))
}

/// Multipart create: a JSON `payload` part plus up to the configured
/// number of `files` parts.
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Announcement>>> {
    let max_files = state.settings.storage.max_files_per_request;

    let mut payload: Option<CreateAnnouncementRequest> = None;
    let mut files: Vec<UploadFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("payload") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable payload: {}", e)))?;
                payload = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| AppError::Validation(format!("Invalid payload: {}", e)))?,
                );
            }
            Some("files") => {
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
            _ => {}
        }
    }

    let request = payload
        .ok_or_else(|| AppError::Validation("Missing payload field".to_string()))?;

    let outcome = state
        .service_context
        .announcement_service
        .create(&current.user, request, files)
        .await?;

    let mut response = ApiResponse::with_message(outcome.announcement, "Announcement created");
    if !outcome.upload_errors.is_empty() {
        response.upload_errors = Some(outcome.upload_errors);
    }
    if !outcome.duplicates.is_empty() {
        response.duplicates = Some(outcome.duplicates);
    }

    Ok(Json(response))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> Result<Json<ApiResponse<Announcement>>> {
    let announcement = state
        .service_context
        .announcement_service
        .update(&current.user, id, request)
        .await?;

    Ok(Json(ApiResponse::ok(announcement)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state
        .service_context
        .announcement_service
        .delete(&current.user, id)
        .await?;

    // Deleting the absent succeeds, so client retries converge.
    Ok(Json(ApiResponse::message_only("Announcement deleted")))
}

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub pin: bool,
}

pub async fn pin(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<PinRequest>,
) -> Result<Json<ApiResponse<Announcement>>> {
    let announcement = state
        .service_context
        .announcement_service
        .set_pinned(&current.user, id, request.pin)
        .await?;

    Ok(Json(ApiResponse::ok(announcement)))
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub archive: bool,
}

pub async fn archive(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<ArchiveRequest>,
) -> Result<Json<ApiResponse<Announcement>>> {
    let announcement = state
        .service_context
        .announcement_service
        .set_archived(&current.user, id, request.archive)
        .await?;

    Ok(Json(ApiResponse::ok(announcement)))
}

#[derive(Debug, Deserialize)]
pub struct ExtendExpiryRequest {
    pub value: i64,
    pub unit: DurationUnit,
}

pub async fn extend_expiry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExtendExpiryRequest>,
) -> Result<Json<ApiResponse<Announcement>>> {
    let last_for = LastFor {
        value: request.value,
        unit: request.unit,
    };

    let announcement = state
        .service_context
        .announcement_service
        .extend_expiry(&current.user, id, last_for)
        .await?;

    Ok(Json(ApiResponse::ok(announcement)))
}
