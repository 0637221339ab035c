use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub announcement_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AnnouncementCreated,
    /// Secondary admin-interest record written after a broadcast.
    AnnouncementActivity,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AnnouncementCreated => "announcement_created",
            NotificationKind::AnnouncementActivity => "announcement_activity",
        }
    }

    pub fn parse(s: &str) -> Option<NotificationKind> {
        match s {
            "announcement_created" => Some(NotificationKind::AnnouncementCreated),
            "announcement_activity" => Some(NotificationKind::AnnouncementActivity),
            _ => None,
        }
    }
}

impl Notification {
    pub fn announcement_created(
        recipient_id: Uuid,
        sender_id: Uuid,
        announcement_id: Uuid,
        title: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            sender_id: Some(sender_id),
            announcement_id: Some(announcement_id),
            kind: NotificationKind::AnnouncementCreated,
            message: format!("New announcement: {}", title),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn announcement_activity(
        recipient_id: Uuid,
        sender_id: Uuid,
        announcement_id: Uuid,
        title: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            sender_id: Some(sender_id),
            announcement_id: Some(announcement_id),
            kind: NotificationKind::AnnouncementActivity,
            message: format!("Announcement published: {}", title),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}
