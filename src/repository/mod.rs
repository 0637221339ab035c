use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod announcement_repository;
pub mod notification_repository;
pub mod user_repository;

pub use announcement_repository::SqliteAnnouncementRepository;
pub use notification_repository::SqliteNotificationRepository;
pub use user_repository::SqliteUserRepository;

#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub category: Option<String>,
    pub is_archived: Option<bool>,
    pub search: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Expiring,
}

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// Insert a new announcement. When `pin` is set, the capacity check
    /// and position assignment run inside the same transaction as the
    /// insert, so a full pin set fails the whole create.
    async fn create(&self, announcement: &Announcement, pin: bool) -> Result<Announcement>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>>;
    async fn list(&self, filter: &AnnouncementFilter) -> Result<Vec<Announcement>>;
    /// Persist the mergeable content fields (title, description,
    /// category, subscribers, allow_comments).
    async fn update_content(&self, announcement: &Announcement) -> Result<()>;
    async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<Announcement>;
    async fn set_archived(&self, id: Uuid, archived: bool) -> Result<Announcement>;
    async fn set_expiry(&self, id: Uuid, last_for: LastFor, expires_at: DateTime<Utc>) -> Result<()>;
    /// Returns true when this was the user's first read.
    async fn mark_read(&self, id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn record_broadcast(&self, id: Uuid, at: DateTime<Utc>, recipients: &[Uuid]) -> Result<()>;
    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Announcement>>;
    async fn delete(&self, id: Uuid) -> Result<()>;

    // Attachments
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<()>;
    async fn live_attachment_hashes(&self, announcement_id: Uuid) -> Result<Vec<String>>;
    async fn find_attachment(&self, id: Uuid) -> Result<Option<Attachment>>;
    async fn soft_delete_attachment(&self, id: Uuid, by: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn restore_attachment(&self, id: Uuid) -> Result<()>;
    async fn remove_attachment(&self, id: Uuid) -> Result<()>;
    async fn set_attachment_tag(&self, id: Uuid, tag: AttachmentTag) -> Result<()>;
    async fn list_attachments(&self, announcement_id: Uuid, include_deleted: bool) -> Result<Vec<Attachment>>;

    // Comments
    async fn add_comment(&self, comment: &Comment) -> Result<()>;
    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> Result<()>;

    // Reactions (idempotent per user/emoji)
    async fn add_reaction(&self, announcement_id: Uuid, emoji: Emoji, user_id: Uuid) -> Result<()>;
    async fn remove_reaction(&self, announcement_id: Uuid, emoji: Emoji, user_id: Uuid) -> Result<()>;
    async fn list_reactions(&self, announcement_id: Uuid) -> Result<Vec<Reaction>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &DirectoryUser, password_hash: &str) -> Result<DirectoryUser>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DirectoryUser>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryUser>>;
    async fn password_hash_by_email(&self, email: &str) -> Result<Option<String>>;
    /// Snapshot of the whole directory for subscriber resolution.
    async fn list_directory(&self) -> Result<Vec<DirectoryUser>>;
    async fn list_admins(&self) -> Result<Vec<DirectoryUser>>;
    async fn emails_for_ids(&self, ids: &[Uuid]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create_batch(&self, notifications: &[Notification]) -> Result<()>;
}
