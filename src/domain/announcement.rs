use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Announcement aggregate root. Sub-collections (attachments, comments,
/// reactions, read receipts) are owned by the announcement and hydrated
/// by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub created_by: Uuid,
    pub subscribers: SubscriberSpec,
    pub last_for: LastFor,
    pub expires_at: DateTime<Utc>,
    pub is_scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub allow_comments: bool,
    pub is_pinned: bool,
    pub pin_position: Option<i64>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    pub comments: Vec<Comment>,
    pub comments_count: i64,
    pub reactions: Vec<Reaction>,
    pub read_by: Vec<ReadReceipt>,
    pub view_count: i64,
    pub broadcasted_at: Option<DateTime<Utc>>,
    pub broadcasted_to: Option<Vec<Uuid>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Announcement category. The free-text label is only representable on
/// the `Custom` variant, so "custom text iff custom category" holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum Category {
    Hr,
    General,
    Urgent,
    SystemUpdate,
    Events,
    Custom(String),
}

impl Category {
    pub fn label(&self) -> &str {
        match self {
            Category::Hr => "HR",
            Category::General => "General",
            Category::Urgent => "Urgent",
            Category::SystemUpdate => "System Update",
            Category::Events => "Events",
            Category::Custom(label) => label.as_str(),
        }
    }
}

/// Who an announcement targets. Resolution against a directory snapshot
/// happens in `crate::resolver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubscriberSpec {
    All,
    Departments { department_ids: Vec<Uuid> },
    Users { user_ids: Vec<Uuid> },
    Managers,
    Custom { user_ids: Vec<Uuid> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastFor {
    pub value: i64,
    pub unit: DurationUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Hours,
    Days,
    Weeks,
    Months,
    /// Anything outside the known vocabulary. Falls back to seven days.
    #[serde(other)]
    Unknown,
}

impl LastFor {
    /// Largest accepted duration value, in any unit. Ten years of days;
    /// requests beyond it are rejected at the service boundary.
    pub const MAX_VALUE: i64 = 3650;

    /// Calendar arithmetic shared by create and extend-expiry. Spans
    /// the calendar cannot represent saturate at the far end instead
    /// of panicking.
    pub fn expires_from(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let span = match self.unit {
            DurationUnit::Hours => Duration::try_hours(self.value),
            DurationUnit::Days => Duration::try_days(self.value),
            DurationUnit::Weeks => Duration::try_weeks(self.value),
            DurationUnit::Months => {
                let by_calendar = u32::try_from(self.value)
                    .ok()
                    .and_then(|months| from.checked_add_months(Months::new(months)));
                if let Some(expires_at) = by_calendar {
                    return expires_at;
                }
                self.value.checked_mul(30).and_then(Duration::try_days)
            }
            DurationUnit::Unknown => Duration::try_days(7),
        };

        span.and_then(|span| from.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Hours => "hours",
            DurationUnit::Days => "days",
            DurationUnit::Weeks => "weeks",
            DurationUnit::Months => "months",
            DurationUnit::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> DurationUnit {
        match s {
            "hours" => DurationUnit::Hours,
            "days" => DurationUnit::Days,
            "weeks" => DurationUnit::Weeks,
            "months" => DurationUnit::Months,
            _ => DurationUnit::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub public_id: String,
    pub resource_type: ResourceType,
    pub original_name: String,
    pub file_hash: String,
    pub uploaded_by: Uuid,
    pub tag: AttachmentTag,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Image,
    Raw,
}

impl ResourceType {
    pub fn from_extension(ext: &str) -> ResourceType {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => ResourceType::Image,
            _ => ResourceType::Raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Raw => "raw",
        }
    }

    pub fn parse(s: &str) -> Option<ResourceType> {
        match s {
            "image" => Some(ResourceType::Image),
            "raw" => Some(ResourceType::Raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentTag {
    Notice,
    Holiday,
    Exam,
    General,
    Policy,
    Other,
}

impl AttachmentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentTag::Notice => "notice",
            AttachmentTag::Holiday => "holiday",
            AttachmentTag::Exam => "exam",
            AttachmentTag::General => "general",
            AttachmentTag::Policy => "policy",
            AttachmentTag::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<AttachmentTag> {
        match s {
            "notice" => Some(AttachmentTag::Notice),
            "holiday" => Some(AttachmentTag::Holiday),
            "exam" => Some(AttachmentTag::Exam),
            "general" => Some(AttachmentTag::General),
            "policy" => Some(AttachmentTag::Policy),
            "other" => Some(AttachmentTag::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub author: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// One record per emoji currently in use. `count` is derived from the
/// user set by the repository; an emoji nobody holds has no record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: Emoji,
    pub users: Vec<Uuid>,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emoji {
    #[serde(rename = "👍")]
    ThumbsUp,
    #[serde(rename = "❤️")]
    Heart,
    #[serde(rename = "🎉")]
    Party,
    #[serde(rename = "🔥")]
    Fire,
    #[serde(rename = "👀")]
    Eyes,
}

impl Emoji {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "👍",
            Emoji::Heart => "❤️",
            Emoji::Party => "🎉",
            Emoji::Fire => "🔥",
            Emoji::Eyes => "👀",
        }
    }

    pub fn parse(s: &str) -> Option<Emoji> {
        match s {
            "👍" => Some(Emoji::ThumbsUp),
            "❤️" => Some(Emoji::Heart),
            "🎉" => Some(Emoji::Party),
            "🔥" => Some(Emoji::Fire),
            "👀" => Some(Emoji::Eyes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subscribers: Option<SubscriberSpec>,
    pub last_for: LastFor,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub allow_comments: Option<bool>,
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub subscribers: Option<SubscriberSpec>,
    pub allow_comments: Option<bool>,
    pub is_pinned: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_arithmetic_per_unit() {
        let now = Utc::now();
        let hours = LastFor { value: 6, unit: DurationUnit::Hours };
        assert_eq!(hours.expires_from(now), now + Duration::hours(6));

        let days = LastFor { value: 2, unit: DurationUnit::Days };
        assert_eq!(days.expires_from(now), now + Duration::days(2));

        let weeks = LastFor { value: 3, unit: DurationUnit::Weeks };
        assert_eq!(weeks.expires_from(now), now + Duration::weeks(3));
    }

    #[test]
    fn absurd_spans_saturate_instead_of_panicking() {
        let now = Utc::now();

        let hours = LastFor { value: 4_000_000_000_000, unit: DurationUnit::Hours };
        assert_eq!(hours.expires_from(now), DateTime::<Utc>::MAX_UTC);

        let months = LastFor { value: 4_000_000_000_000, unit: DurationUnit::Months };
        assert_eq!(months.expires_from(now), DateTime::<Utc>::MAX_UTC);

        // Fits u32 but overflows the calendar; still saturates.
        let far_months = LastFor { value: 4_000_000, unit: DurationUnit::Months };
        assert_eq!(far_months.expires_from(now), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn unknown_unit_defaults_to_seven_days() {
        let now = Utc::now();
        let odd = LastFor { value: 4, unit: DurationUnit::Unknown };
        assert_eq!(odd.expires_from(now), now + Duration::days(7));
    }

    #[test]
    fn unknown_unit_deserializes_via_fallback() {
        let parsed: LastFor =
            serde_json::from_str(r#"{"value": 1, "unit": "fortnights"}"#).unwrap();
        assert_eq!(parsed.unit, DurationUnit::Unknown);
    }

    #[test]
    fn custom_category_carries_label() {
        let parsed: Category =
            serde_json::from_str(r#"{"kind": "custom", "label": "Facilities"}"#).unwrap();
        assert_eq!(parsed, Category::Custom("Facilities".to_string()));
        assert_eq!(parsed.label(), "Facilities");
    }

    #[test]
    fn emoji_vocabulary_is_closed() {
        assert_eq!(Emoji::parse("👍"), Some(Emoji::ThumbsUp));
        assert_eq!(Emoji::parse("😂"), None);
    }
}
