use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::policy,
    domain::{Comment, DirectoryUser, Emoji, Reaction},
    error::{AppError, Result},
    fanout::{EventKind, Fanout, InvalidationScope},
    repository::AnnouncementRepository,
};

pub struct EngagementService {
    repo: Arc<dyn AnnouncementRepository>,
    fanout: Arc<Fanout>,
}

impl EngagementService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>, fanout: Arc<Fanout>) -> Self {
        Self { repo, fanout }
    }

    pub async fn add_comment(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        body: String,
    ) -> Result<Comment> {
        let announcement = self
            .repo
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        if !announcement.allow_comments {
            return Err(AppError::Validation(
                "Comments are disabled for this announcement".to_string(),
            ));
        }
        if body.trim().is_empty() {
            return Err(AppError::Validation("Comment text is required".to_string()));
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            announcement_id,
            author: user.id,
            body,
            created_at: Utc::now(),
        };
        self.repo.add_comment(&comment).await?;

        self.fanout
            .announce_change(
                EventKind::CommentAdded,
                announcement_id,
                json!({ "comment": comment }),
                InvalidationScope::Narrow,
            )
            .await;

        Ok(comment)
    }

    /// Removes the comment outright; no tombstone is kept.
    pub async fn delete_comment(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        comment_id: Uuid,
    ) -> Result<()> {
        let comment = self
            .repo
            .find_comment(comment_id)
            .await?
            .filter(|c| c.announcement_id == announcement_id)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        if !policy::can_moderate_comment(user, &comment) {
            return Err(AppError::Forbidden);
        }

        self.repo.delete_comment(comment_id).await?;

        self.fanout
            .announce_change(
                EventKind::CommentDeleted,
                announcement_id,
                json!({ "comment_id": comment_id }),
                InvalidationScope::Narrow,
            )
            .await;

        Ok(())
    }

    /// Idempotent: repeated adds by the same user are no-ops.
    pub async fn add_reaction(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        emoji: &str,
    ) -> Result<Vec<Reaction>> {
        let emoji = parse_emoji(emoji)?;

        self.repo
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        self.repo.add_reaction(announcement_id, emoji, user.id).await?;

        self.fanout
            .announce_change(
                EventKind::ReactionAdded,
                announcement_id,
                json!({ "emoji": emoji.as_str(), "user_id": user.id }),
                InvalidationScope::Narrow,
            )
            .await;

        self.repo.list_reactions(announcement_id).await
    }

    /// The last user leaving an emoji removes its record entirely.
    pub async fn remove_reaction(
        &self,
        user: &DirectoryUser,
        announcement_id: Uuid,
        emoji: &str,
    ) -> Result<Vec<Reaction>> {
        let emoji = parse_emoji(emoji)?;

        self.repo
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

        self.repo.remove_reaction(announcement_id, emoji, user.id).await?;

        self.fanout
            .announce_change(
                EventKind::ReactionRemoved,
                announcement_id,
                json!({ "emoji": emoji.as_str(), "user_id": user.id }),
                InvalidationScope::Narrow,
            )
            .await;

        self.repo.list_reactions(announcement_id).await
    }
}

fn parse_emoji(s: &str) -> Result<Emoji> {
    Emoji::parse(s).ok_or_else(|| AppError::Validation(format!("Unsupported emoji: {}", s)))
}
