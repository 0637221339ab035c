use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::policy,
    domain::{Attachment, AttachmentTag, DirectoryUser, ResourceType, Role},
    error::{AppError, Result},
    fanout::{EventKind, Fanout, InvalidationScope},
    repository::AnnouncementRepository,
    storage::{content_hash, BlobStore},
};

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub original_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub original_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct UploadOutcome {
    pub added: Vec<Attachment>,
    /// Names rejected because their content hash matched a live attachment.
    pub duplicates: Vec<String>,
    /// Per-file blob or record failures; never abort the batch.
    pub failed: Vec<UploadFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentListing {
    pub images: Vec<Attachment>,
    pub documents: Vec<Attachment>,
    pub image_count: usize,
    pub document_count: usize,
    pub total: usize,
}

pub struct AttachmentService {
    repo: Arc<dyn AnnouncementRepository>,
    blobs: Arc<dyn BlobStore>,
    fanout: Arc<Fanout>,
}

impl AttachmentService {
    pub fn new(
        repo: Arc<dyn AnnouncementRepository>,
        blobs: Arc<dyn BlobStore>,
        fanout: Arc<Fanout>,
    ) -> Self {
        Self { repo, blobs, fanout }
    }

    /// Standalone upload route. Escalates to a conflict only when the
    /// whole batch was duplicates.
    pub async fn upload(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        files: Vec<UploadFile>,
    ) -> Result<UploadOutcome> {
        let announcement = self
            .repo
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        if !policy::can_upload_attachment(user, &announcement) {
            return Err(AppError::Forbidden);
        }

        let outcome = self.upload_batch(user, announcement_id, files).await?;

        if outcome.added.is_empty() && !outcome.duplicates.is_empty() && outcome.failed.is_empty() {
            return Err(AppError::Conflict(
                "All files duplicate existing attachments".to_string(),
            ));
        }

        if !outcome.added.is_empty() {
            self.fanout
                .announce_change(
                    EventKind::AttachmentsAdded,
                    announcement_id,
                    json!({ "attachments": outcome.added }),
                    InvalidationScope::Narrow,
                )
                .await;
        }

        Ok(outcome)
    }

    /// Batch upload with content-hash dedup. Duplicates and per-file
    /// failures are partitioned out; remaining files land in the blob
    /// store and become live attachment records.
    pub async fn upload_batch(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        files: Vec<UploadFile>,
    ) -> Result<UploadOutcome> {
        let mut outcome = UploadOutcome::default();

        let mut seen: HashSet<String> = self
            .repo
            .live_attachment_hashes(announcement_id)
            .await?
            .into_iter()
            .collect();

        for file in files {
            let hash = content_hash(&file.data);
            if seen.contains(&hash) {
                outcome.duplicates.push(file.original_name);
                continue;
            }

            let blob = match self.blobs.put(announcement_id, &file.original_name, &file.data).await {
                Ok(blob) => blob,
                Err(e) => {
                    tracing::warn!("Upload of {} failed: {}", file.original_name, e);
                    outcome.failed.push(UploadFailure {
                        original_name: file.original_name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let attachment = Attachment {
                id: Uuid::new_v4(),
                announcement_id,
                public_id: blob.public_id.clone(),
                resource_type: blob.resource_type,
                original_name: file.original_name.clone(),
                file_hash: hash.clone(),
                uploaded_by: user.id,
                tag: AttachmentTag::General,
                is_deleted: false,
                deleted_at: None,
                deleted_by: None,
                created_at: Utc::now(),
            };

            match self.repo.insert_attachment(&attachment).await {
                Ok(()) => {
                    seen.insert(hash);
                    outcome.added.push(attachment);
                }
                Err(AppError::Conflict(_)) => {
                    // A concurrent upload won the unique index; clean up
                    // the orphaned blob and report as duplicate.
                    if let Err(e) = self.blobs.delete(&blob.public_id).await {
                        tracing::warn!("Orphan blob cleanup failed: {}", e);
                    }
                    outcome.duplicates.push(file.original_name);
                }
                Err(e) => {
                    tracing::warn!("Attachment record for {} failed: {}", file.original_name, e);
                    if let Err(e) = self.blobs.delete(&blob.public_id).await {
                        tracing::warn!("Orphan blob cleanup failed: {}", e);
                    }
                    outcome.failed.push(UploadFailure {
                        original_name: file.original_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    pub async fn soft_delete(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Attachment> {
        let (announcement, attachment) = self.load_pair(announcement_id, attachment_id).await?;

        if !policy::can_delete_attachment(user, &announcement, &attachment) {
            return Err(AppError::Forbidden);
        }

        if !attachment.is_deleted {
            self.repo
                .soft_delete_attachment(attachment_id, user.id, Utc::now())
                .await?;

            self.fanout
                .announce_change(
                    EventKind::AttachmentDeleted,
                    announcement.id,
                    json!({ "attachment_id": attachment_id, "permanent": false }),
                    InvalidationScope::Narrow,
                )
                .await;
        }

        self.repo
            .find_attachment(attachment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))
    }

    pub async fn restore(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Attachment> {
        if !policy::can_restore_attachment(user) {
            return Err(AppError::Forbidden);
        }

        let (announcement, attachment) = self.load_pair(announcement_id, attachment_id).await?;

        if !attachment.is_deleted {
            return Err(AppError::Validation(
                "Attachment is not deleted".to_string(),
            ));
        }

        self.repo.restore_attachment(attachment_id).await?;

        self.fanout
            .announce_change(
                EventKind::AttachmentRestored,
                announcement.id,
                json!({ "attachment_id": attachment_id }),
                InvalidationScope::Narrow,
            )
            .await;

        self.repo
            .find_attachment(attachment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))
    }

    /// Irreversible: removes the blob (best-effort) and the record. Does
    /// not require a prior soft delete.
    pub async fn hard_delete(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<()> {
        let (announcement, attachment) = self.load_pair(announcement_id, attachment_id).await?;

        if !policy::can_delete_attachment(user, &announcement, &attachment) {
            return Err(AppError::Forbidden);
        }

        if let Err(e) = self.blobs.delete(&attachment.public_id).await {
            tracing::warn!("Blob removal for {} failed: {}", attachment.public_id, e);
        }

        self.repo.remove_attachment(attachment_id).await?;

        self.fanout
            .announce_change(
                EventKind::AttachmentDeleted,
                announcement.id,
                json!({ "attachment_id": attachment_id, "permanent": true }),
                InvalidationScope::Narrow,
            )
            .await;

        Ok(())
    }

    pub async fn set_tag(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        attachment_id: Uuid,
        tag: &str,
    ) -> Result<Attachment> {
        let tag = AttachmentTag::parse(tag)
            .ok_or_else(|| AppError::Validation(format!("Unknown attachment tag: {}", tag)))?;

        let (announcement, attachment) = self.load_pair(announcement_id, attachment_id).await?;

        if !policy::can_tag_attachment(user, &announcement, &attachment) {
            return Err(AppError::Forbidden);
        }

        self.repo.set_attachment_tag(attachment_id, tag).await?;

        self.fanout
            .announce_change(
                EventKind::Updated,
                announcement.id,
                json!({ "attachment_id": attachment_id, "tag": tag.as_str() }),
                InvalidationScope::Narrow,
            )
            .await;

        self.repo
            .find_attachment(attachment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))
    }

    /// Soft-deleted attachments are only visible to admins who ask.
    pub async fn list(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        include_deleted: bool,
    ) -> Result<AttachmentListing> {
        self.repo
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        let include_deleted = include_deleted && user.role == Role::Admin;
        let attachments = self.repo.list_attachments(announcement_id, include_deleted).await?;

        let (images, documents): (Vec<_>, Vec<_>) = attachments
            .into_iter()
            .partition(|a| a.resource_type == ResourceType::Image);

        Ok(AttachmentListing {
            image_count: images.len(),
            document_count: documents.len(),
            total: images.len() + documents.len(),
            images,
            documents,
        })
    }

    async fn load_pair(
        &self,
        announcement_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<(crate::domain::Announcement, Attachment)> {
        let attachment = self
            .repo
            .find_attachment(attachment_id)
            .await?
            .filter(|a| a.announcement_id == announcement_id)
            .ok_or_else(|| AppError::NotFound("Attachment not found".to_string()))?;

        let announcement = self
            .repo
            .find_by_id(attachment.announcement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        Ok((announcement, attachment))
    }
}
