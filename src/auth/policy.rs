use crate::domain::{Announcement, Attachment, Comment, DirectoryUser, Role};

/// One predicate for every announcement transition, instead of role
/// checks duplicated per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Publish,
    Edit,
    Delete,
    Pin,
    Archive,
    ExtendExpiry,
}

impl Capability {
    pub fn allows(&self, user: &DirectoryUser, announcement: Option<&Announcement>) -> bool {
        let is_creator = announcement
            .map(|a| a.created_by == user.id)
            .unwrap_or(false);

        match self {
            Capability::Publish => {
                matches!(user.role, Role::Admin | Role::Manager | Role::Hr)
            }
            Capability::Edit | Capability::Delete | Capability::ExtendExpiry => {
                is_creator || matches!(user.role, Role::Admin | Role::Manager)
            }
            Capability::Pin | Capability::Archive => {
                is_creator || user.role == Role::Admin
            }
        }
    }
}

pub fn can_moderate_comment(user: &DirectoryUser, comment: &Comment) -> bool {
    comment.author == user.id || user.role == Role::Admin
}

/// Soft and hard delete share the same actor set.
pub fn can_delete_attachment(
    user: &DirectoryUser,
    announcement: &Announcement,
    attachment: &Attachment,
) -> bool {
    announcement.created_by == user.id
        || attachment.uploaded_by == user.id
        || user.role == Role::Admin
}

pub fn can_restore_attachment(user: &DirectoryUser) -> bool {
    user.role == Role::Admin
}

pub fn can_tag_attachment(
    user: &DirectoryUser,
    announcement: &Announcement,
    attachment: &Attachment,
) -> bool {
    announcement.created_by == user.id
        || attachment.uploaded_by == user.id
        || matches!(user.role, Role::Admin | Role::Manager)
}

pub fn can_upload_attachment(user: &DirectoryUser, announcement: &Announcement) -> bool {
    announcement.created_by == user.id || matches!(user.role, Role::Admin | Role::Manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role) -> DirectoryUser {
        DirectoryUser {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            full_name: "User".to_string(),
            role,
            department_id: None,
            is_active: true,
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn announcement(created_by: Uuid) -> Announcement {
        use crate::domain::{Category, DurationUnit, LastFor, SubscriberSpec};
        let now = Utc::now();
        Announcement {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: "d".to_string(),
            category: Category::General,
            created_by,
            subscribers: SubscriberSpec::All,
            last_for: LastFor { value: 1, unit: DurationUnit::Days },
            expires_at: now,
            is_scheduled: false,
            scheduled_for: None,
            allow_comments: true,
            is_pinned: false,
            pin_position: None,
            is_archived: false,
            archived_at: None,
            attachments: vec![],
            comments: vec![],
            comments_count: 0,
            reactions: vec![],
            read_by: vec![],
            view_count: 0,
            broadcasted_at: None,
            broadcasted_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn publish_requires_elevated_role() {
        assert!(Capability::Publish.allows(&user(Role::Admin), None));
        assert!(Capability::Publish.allows(&user(Role::Manager), None));
        assert!(Capability::Publish.allows(&user(Role::Hr), None));
        assert!(!Capability::Publish.allows(&user(Role::Employee), None));
    }

    #[test]
    fn creator_can_edit_but_hr_cannot_edit_others() {
        let creator = user(Role::Employee);
        let ann = announcement(creator.id);
        assert!(Capability::Edit.allows(&creator, Some(&ann)));
        assert!(!Capability::Edit.allows(&user(Role::Hr), Some(&ann)));
        assert!(Capability::Edit.allows(&user(Role::Manager), Some(&ann)));
    }

    #[test]
    fn pin_is_creator_or_admin_only() {
        let creator = user(Role::Hr);
        let ann = announcement(creator.id);
        assert!(Capability::Pin.allows(&creator, Some(&ann)));
        assert!(Capability::Pin.allows(&user(Role::Admin), Some(&ann)));
        assert!(!Capability::Pin.allows(&user(Role::Manager), Some(&ann)));
    }
}
