use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::Capability,
    domain::{
        Announcement, Category, CreateAnnouncementRequest, DirectoryUser, LastFor,
        SubscriberSpec, UpdateAnnouncementRequest,
    },
    error::{AppError, Result},
    fanout::{EventKind, Fanout, InvalidationScope},
    repository::{AnnouncementFilter, AnnouncementRepository, UserRepository},
    service::attachment_service::{AttachmentService, UploadFailure, UploadFile},
    storage::BlobStore,
};

pub struct CreateOutcome {
    pub announcement: Announcement,
    pub upload_errors: Vec<UploadFailure>,
    pub duplicates: Vec<String>,
}

pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
    users: Arc<dyn UserRepository>,
    blobs: Arc<dyn BlobStore>,
    attachments: Arc<AttachmentService>,
    fanout: Arc<Fanout>,
}

impl AnnouncementService {
    pub fn new(
        repo: Arc<dyn AnnouncementRepository>,
        users: Arc<dyn UserRepository>,
        blobs: Arc<dyn BlobStore>,
        attachments: Arc<AttachmentService>,
        fanout: Arc<Fanout>,
    ) -> Self {
        Self { repo, users, blobs, attachments, fanout }
    }

    /// Create an announcement. Non-scheduled creations broadcast
    /// synchronously; attachment upload failures are returned to the
    /// caller without failing the create.
    pub async fn create(
        &self,
        user: &DirectoryUser,
        request: CreateAnnouncementRequest,
        files: Vec<UploadFile>,
    ) -> Result<CreateOutcome> {
        if !Capability::Publish.allows(user, None) {
            return Err(AppError::Forbidden);
        }

        validate_content(&request.title, &request.description, Some(&request.category))?;
        validate_last_for(&request.last_for)?;

        let now = Utc::now();
        // A parseable future-or-present instant schedules; anything else
        // broadcasts immediately.
        let scheduled_for = request.scheduled_for.filter(|when| *when >= now);
        let is_scheduled = scheduled_for.is_some();

        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            category: request.category,
            created_by: user.id,
            subscribers: request.subscribers.unwrap_or(SubscriberSpec::All),
            last_for: request.last_for,
            expires_at: request.last_for.expires_from(now),
            is_scheduled,
            scheduled_for,
            allow_comments: request.allow_comments.unwrap_or(true),
            is_pinned: false,
            pin_position: None,
            is_archived: false,
            archived_at: None,
            attachments: Vec::new(),
            comments: Vec::new(),
            comments_count: 0,
            reactions: Vec::new(),
            read_by: Vec::new(),
            view_count: 0,
            broadcasted_at: None,
            broadcasted_to: None,
            created_at: now,
            updated_at: now,
        };

        // Pin capacity is checked inside the insert transaction; a full
        // pin set fails the whole create.
        let created = self
            .repo
            .create(&announcement, request.is_pinned.unwrap_or(false))
            .await?;

        let upload_outcome = if files.is_empty() {
            Default::default()
        } else {
            self.attachments.upload_batch(user, created.id, files).await?
        };

        if !created.is_scheduled {
            self.fanout.broadcast_created(&created, user).await;
        }

        let announcement = self
            .repo
            .find_by_id(created.id)
            .await?
            .ok_or_else(|| AppError::Database("Created announcement vanished".to_string()))?;

        Ok(CreateOutcome {
            announcement,
            upload_errors: upload_outcome.failed,
            duplicates: upload_outcome.duplicates,
        })
    }

    pub async fn list(&self, filter: &AnnouncementFilter) -> Result<Vec<Announcement>> {
        self.repo.list(filter).await
    }

    /// Record the user's first view; repeats are no-ops. Returns true
    /// when this read bumped the view count.
    pub async fn mark_read(&self, user: &DirectoryUser, id: Uuid) -> Result<bool> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        self.repo.mark_read(id, user.id, Utc::now()).await
    }

    pub async fn fetch(&self, id: Uuid) -> Result<Announcement> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    /// Fetch one announcement, marking it read for the requesting user.
    pub async fn get(&self, user: &DirectoryUser, id: Uuid) -> Result<Announcement> {
        self.mark_read(user, id).await?;
        self.fetch(id).await
    }

    /// Partial content merge. A changed `is_pinned` goes through the pin
    /// transition first, so a capacity rejection leaves the content
    /// untouched; the new subscriber spec only affects future reads and
    /// broadcasts.
    pub async fn update(
        &self,
        user: &DirectoryUser,
        id: Uuid,
        request: UpdateAnnouncementRequest,
    ) -> Result<Announcement> {
        let mut announcement = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        if !Capability::Edit.allows(user, Some(&announcement)) {
            return Err(AppError::Forbidden);
        }

        if let Some(title) = request.title {
            announcement.title = title;
        }
        if let Some(description) = request.description {
            announcement.description = description;
        }
        if let Some(category) = request.category {
            announcement.category = category;
        }
        if let Some(subscribers) = request.subscribers {
            announcement.subscribers = subscribers;
        }
        if let Some(allow_comments) = request.allow_comments {
            announcement.allow_comments = allow_comments;
        }

        validate_content(
            &announcement.title,
            &announcement.description,
            Some(&announcement.category),
        )?;

        let pin_toggle = request.is_pinned.filter(|pinned| *pinned != announcement.is_pinned);
        if pin_toggle.is_some() && !Capability::Pin.allows(user, Some(&announcement)) {
            return Err(AppError::Forbidden);
        }

        if let Some(pinned) = pin_toggle {
            self.repo.set_pinned(id, pinned).await?;
        }

        self.repo.update_content(&announcement).await?;

        self.fanout
            .announce_change(
                EventKind::Updated,
                id,
                json!({ "title": announcement.title }),
                InvalidationScope::Broad,
            )
            .await;

        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    pub async fn set_pinned(&self, user: &DirectoryUser, id: Uuid, pinned: bool) -> Result<Announcement> {
        let announcement = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        if !Capability::Pin.allows(user, Some(&announcement)) {
            return Err(AppError::Forbidden);
        }

        let updated = self.repo.set_pinned(id, pinned).await?;

        self.fanout
            .announce_change(
                EventKind::PinToggled,
                id,
                json!({ "pinned": pinned, "pin_position": updated.pin_position }),
                InvalidationScope::Broad,
            )
            .await;

        Ok(updated)
    }

    pub async fn set_archived(&self, user: &DirectoryUser, id: Uuid, archived: bool) -> Result<Announcement> {
        let announcement = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        if !Capability::Archive.allows(user, Some(&announcement)) {
            return Err(AppError::Forbidden);
        }

        let updated = self.repo.set_archived(id, archived).await?;

        self.fanout
            .announce_change(
                EventKind::Archived,
                id,
                json!({ "archived": archived }),
                InvalidationScope::Broad,
            )
            .await;

        Ok(updated)
    }

    /// Recompute `expires_at` from a fresh duration, independent of pin
    /// and archive state.
    pub async fn extend_expiry(&self, user: &DirectoryUser, id: Uuid, last_for: LastFor) -> Result<Announcement> {
        let announcement = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        if !Capability::ExtendExpiry.allows(user, Some(&announcement)) {
            return Err(AppError::Forbidden);
        }

        validate_last_for(&last_for)?;
        let expires_at = last_for.expires_from(Utc::now());

        self.repo.set_expiry(id, last_for, expires_at).await?;

        self.fanout
            .announce_change(
                EventKind::ExpiryExtended,
                id,
                json!({ "expires_at": expires_at }),
                InvalidationScope::Broad,
            )
            .await;

        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    /// Idempotent delete: a missing announcement is a success so client
    /// retries are safe. Owned blobs are purged best-effort.
    pub async fn delete(&self, user: &DirectoryUser, id: Uuid) -> Result<()> {
        let announcement = match self.repo.find_by_id(id).await? {
            Some(announcement) => announcement,
            None => return Ok(()),
        };

        if !Capability::Delete.allows(user, Some(&announcement)) {
            return Err(AppError::Forbidden);
        }

        for attachment in self.repo.list_attachments(id, true).await? {
            if let Err(e) = self.blobs.delete(&attachment.public_id).await {
                tracing::warn!("Blob purge for {} failed: {}", attachment.public_id, e);
            }
        }

        self.repo.delete(id).await?;

        self.fanout
            .announce_change(EventKind::Deleted, id, json!({}), InvalidationScope::Broad)
            .await;

        Ok(())
    }

    /// Broadcast scheduled announcements whose time has come. Runs from
    /// the background sweeper; per-item failures are logged and skipped.
    pub async fn broadcast_due(&self) -> Result<usize> {
        let due = self.repo.list_due_scheduled(Utc::now()).await?;
        let count = due.len();

        for announcement in due {
            let sender = match self.users.find_by_id(announcement.created_by).await {
                Ok(Some(sender)) => sender,
                Ok(None) => {
                    tracing::warn!(
                        "Skipping scheduled announcement {}: creator no longer exists",
                        announcement.id
                    );
                    continue;
                }
                Err(e) => {
                    tracing::error!("Could not load creator for {}: {}", announcement.id, e);
                    continue;
                }
            };

            tracing::info!("Broadcasting scheduled announcement {}", announcement.id);
            self.fanout.broadcast_created(&announcement, &sender).await;
        }

        Ok(count)
    }
}

fn validate_content(title: &str, description: &str, category: Option<&Category>) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }
    if let Some(Category::Custom(label)) = category {
        if label.trim().is_empty() {
            return Err(AppError::Validation(
                "Custom category requires a label".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_last_for(last_for: &LastFor) -> Result<()> {
    if last_for.value < 1 || last_for.value > LastFor::MAX_VALUE {
        return Err(AppError::Validation(format!(
            "Duration value must be between 1 and {}",
            LastFor::MAX_VALUE
        )));
    }
    Ok(())
}
