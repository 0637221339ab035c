use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Announcement, Attachment, AttachmentTag, Category, Comment, DurationUnit, Emoji, LastFor,
        Reaction, ReadReceipt, ResourceType, SubscriberSpec,
    },
    error::{AppError, Result},
    repository::{AnnouncementFilter, AnnouncementRepository, SortOrder},
};

/// At most this many announcements may be pinned among the non-archived set.
pub const MAX_PINNED: i64 = 3;

#[derive(FromRow)]
struct AnnouncementRow {
    id: String,
    title: String,
    description: String,
    category: String,
    custom_category: Option<String>,
    created_by: String,
    subscribers: String,
    last_for_value: i64,
    last_for_unit: String,
    expires_at: NaiveDateTime,
    is_scheduled: i32,
    scheduled_for: Option<NaiveDateTime>,
    allow_comments: i32,
    is_pinned: i32,
    pin_position: Option<i64>,
    is_archived: i32,
    archived_at: Option<NaiveDateTime>,
    view_count: i64,
    broadcasted_at: Option<NaiveDateTime>,
    broadcasted_to: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct AttachmentRow {
    id: String,
    announcement_id: String,
    public_id: String,
    resource_type: String,
    original_name: String,
    file_hash: String,
    uploaded_by: String,
    tag: String,
    is_deleted: i32,
    deleted_at: Option<NaiveDateTime>,
    deleted_by: Option<String>,
    created_at: NaiveDateTime,
}

#[derive(FromRow)]
struct CommentRow {
    id: String,
    announcement_id: String,
    author: String,
    body: String,
    created_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ReactionRow {
    emoji: String,
    user_id: String,
}

#[derive(FromRow)]
struct ReadReceiptRow {
    user_id: String,
    read_at: NaiveDateTime,
}

const ANNOUNCEMENT_COLUMNS: &str = "id, title, description, category, custom_category, created_by, \
     subscribers, last_for_value, last_for_unit, expires_at, is_scheduled, scheduled_for, \
     allow_comments, is_pinned, pin_position, is_archived, archived_at, view_count, \
     broadcasted_at, broadcasted_to, created_at, updated_at";

pub struct SqliteAnnouncementRepository {
    pool: SqlitePool,
}

impl SqliteAnnouncementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
    }

    fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(naive, Utc)
    }

    fn category_to_columns(category: &Category) -> (&'static str, Option<&str>) {
        match category {
            Category::Hr => ("hr", None),
            Category::General => ("general", None),
            Category::Urgent => ("urgent", None),
            Category::SystemUpdate => ("system_update", None),
            Category::Events => ("events", None),
            Category::Custom(label) => ("custom", Some(label.as_str())),
        }
    }

    fn parse_category(kind: &str, custom: Option<String>) -> Result<Category> {
        match kind {
            "hr" => Ok(Category::Hr),
            "general" => Ok(Category::General),
            "urgent" => Ok(Category::Urgent),
            "system_update" => Ok(Category::SystemUpdate),
            "events" => Ok(Category::Events),
            "custom" => Ok(Category::Custom(custom.unwrap_or_default())),
            _ => Err(AppError::Database(format!("Invalid category: {}", kind))),
        }
    }

    fn row_to_announcement(row: AnnouncementRow) -> Result<Announcement> {
        let subscribers: SubscriberSpec = serde_json::from_str(&row.subscribers)
            .map_err(|e| AppError::Database(format!("Invalid subscriber spec: {}", e)))?;
        let broadcasted_to = match row.broadcasted_to {
            Some(json) => Some(
                serde_json::from_str::<Vec<Uuid>>(&json)
                    .map_err(|e| AppError::Database(format!("Invalid broadcast snapshot: {}", e)))?,
            ),
            None => None,
        };

        Ok(Announcement {
            id: Self::parse_uuid(&row.id)?,
            title: row.title,
            description: row.description,
            category: Self::parse_category(&row.category, row.custom_category)?,
            created_by: Self::parse_uuid(&row.created_by)?,
            subscribers,
            last_for: LastFor {
                value: row.last_for_value,
                unit: DurationUnit::parse(&row.last_for_unit),
            },
            expires_at: Self::utc(row.expires_at),
            is_scheduled: row.is_scheduled != 0,
            scheduled_for: row.scheduled_for.map(Self::utc),
            allow_comments: row.allow_comments != 0,
            is_pinned: row.is_pinned != 0,
            pin_position: row.pin_position,
            is_archived: row.is_archived != 0,
            archived_at: row.archived_at.map(Self::utc),
            attachments: Vec::new(),
            comments: Vec::new(),
            comments_count: 0,
            reactions: Vec::new(),
            read_by: Vec::new(),
            view_count: row.view_count,
            broadcasted_at: row.broadcasted_at.map(Self::utc),
            broadcasted_to,
            created_at: Self::utc(row.created_at),
            updated_at: Self::utc(row.updated_at),
        })
    }

    fn row_to_attachment(row: AttachmentRow) -> Result<Attachment> {
        Ok(Attachment {
            id: Self::parse_uuid(&row.id)?,
            announcement_id: Self::parse_uuid(&row.announcement_id)?,
            public_id: row.public_id,
            resource_type: ResourceType::parse(&row.resource_type)
                .ok_or_else(|| AppError::Database(format!("Invalid resource type: {}", row.resource_type)))?,
            original_name: row.original_name,
            file_hash: row.file_hash,
            uploaded_by: Self::parse_uuid(&row.uploaded_by)?,
            tag: AttachmentTag::parse(&row.tag)
                .ok_or_else(|| AppError::Database(format!("Invalid attachment tag: {}", row.tag)))?,
            is_deleted: row.is_deleted != 0,
            deleted_at: row.deleted_at.map(Self::utc),
            deleted_by: row.deleted_by.as_deref().map(Self::parse_uuid).transpose()?,
            created_at: Self::utc(row.created_at),
        })
    }

    fn row_to_comment(row: CommentRow) -> Result<Comment> {
        Ok(Comment {
            id: Self::parse_uuid(&row.id)?,
            announcement_id: Self::parse_uuid(&row.announcement_id)?,
            author: Self::parse_uuid(&row.author)?,
            body: row.body,
            created_at: Self::utc(row.created_at),
        })
    }

    /// Fill the owned sub-collections of a bare announcement row.
    async fn hydrate(&self, mut announcement: Announcement) -> Result<Announcement> {
        announcement.attachments = self.list_attachments(announcement.id, false).await?;
        announcement.comments = self.comments_for(announcement.id).await?;
        announcement.comments_count = announcement.comments.len() as i64;
        announcement.reactions = self.list_reactions(announcement.id).await?;
        announcement.read_by = self.read_receipts_for(announcement.id).await?;
        Ok(announcement)
    }

    async fn comments_for(&self, announcement_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, announcement_id, author, body, created_at
            FROM comments
            WHERE announcement_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(announcement_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_comment).collect()
    }

    async fn read_receipts_for(&self, announcement_id: Uuid) -> Result<Vec<ReadReceipt>> {
        let rows = sqlx::query_as::<_, ReadReceiptRow>(
            "SELECT user_id, read_at FROM read_receipts WHERE announcement_id = ? ORDER BY read_at ASC",
        )
        .bind(announcement_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ReadReceipt {
                    user_id: Self::parse_uuid(&row.user_id)?,
                    read_at: Self::utc(row.read_at),
                })
            })
            .collect()
    }
}

#[async_trait]
impl AnnouncementRepository for SqliteAnnouncementRepository {
    async fn create(&self, announcement: &Announcement, pin: bool) -> Result<Announcement> {
        let mut tx = self.pool.begin().await?;

        let (mut is_pinned, mut pin_position) = (0i32, None::<i64>);
        if pin {
            let pinned_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM announcements WHERE is_pinned = 1 AND is_archived = 0",
            )
            .fetch_one(&mut *tx)
            .await?;

            if pinned_count >= MAX_PINNED {
                return Err(AppError::Capacity(format!(
                    "Pin limit reached (max {} pinned announcements)",
                    MAX_PINNED
                )));
            }
            is_pinned = 1;
            pin_position = Some(pinned_count + 1);
        }

        let (category, custom_category) = Self::category_to_columns(&announcement.category);
        let subscribers = serde_json::to_string(&announcement.subscribers)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO announcements (
                id, title, description, category, custom_category, created_by,
                subscribers, last_for_value, last_for_unit, expires_at,
                is_scheduled, scheduled_for, allow_comments,
                is_pinned, pin_position, is_archived, archived_at,
                view_count, broadcasted_at, broadcasted_to, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, 0, NULL, NULL, ?, ?)
            "#,
        )
        .bind(announcement.id.to_string())
        .bind(&announcement.title)
        .bind(&announcement.description)
        .bind(category)
        .bind(custom_category)
        .bind(announcement.created_by.to_string())
        .bind(&subscribers)
        .bind(announcement.last_for.value)
        .bind(announcement.last_for.unit.as_str())
        .bind(announcement.expires_at.naive_utc())
        .bind(if announcement.is_scheduled { 1i32 } else { 0i32 })
        .bind(announcement.scheduled_for.map(|dt| dt.naive_utc()))
        .bind(if announcement.allow_comments { 1i32 } else { 0i32 })
        .bind(is_pinned)
        .bind(pin_position)
        .bind(announcement.created_at.naive_utc())
        .bind(announcement.updated_at.naive_utc())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(announcement.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created announcement".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>> {
        let row = sqlx::query_as::<_, AnnouncementRow>(&format!(
            "SELECT {} FROM announcements WHERE id = ?",
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(Self::row_to_announcement(row)?).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &AnnouncementFilter) -> Result<Vec<Announcement>> {
        let mut sql = format!(
            "SELECT {} FROM announcements WHERE 1 = 1",
            ANNOUNCEMENT_COLUMNS
        );
        if filter.is_archived.is_some() {
            sql.push_str(" AND is_archived = ?");
        }
        if filter.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if filter.search.is_some() {
            sql.push_str(" AND (title LIKE ? OR description LIKE ?)");
        }
        sql.push_str(match filter.sort {
            SortOrder::Newest => {
                " ORDER BY is_pinned DESC, pin_position ASC, created_at DESC"
            }
            SortOrder::Oldest => " ORDER BY created_at ASC",
            SortOrder::Expiring => " ORDER BY expires_at ASC",
        });

        let mut query = sqlx::query_as::<_, AnnouncementRow>(&sql);
        if let Some(archived) = filter.is_archived {
            query = query.bind(if archived { 1i32 } else { 0i32 });
        }
        if let Some(category) = &filter.category {
            query = query.bind(category.clone());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            query = query.bind(pattern.clone()).bind(pattern);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut announcements = Vec::with_capacity(rows.len());
        for row in rows {
            announcements.push(self.hydrate(Self::row_to_announcement(row)?).await?);
        }
        Ok(announcements)
    }

    async fn update_content(&self, announcement: &Announcement) -> Result<()> {
        let (category, custom_category) = Self::category_to_columns(&announcement.category);
        let subscribers = serde_json::to_string(&announcement.subscribers)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE announcements
            SET title = ?, description = ?, category = ?, custom_category = ?,
                subscribers = ?, allow_comments = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&announcement.title)
        .bind(&announcement.description)
        .bind(category)
        .bind(custom_category)
        .bind(&subscribers)
        .bind(if announcement.allow_comments { 1i32 } else { 0i32 })
        .bind(Utc::now().naive_utc())
        .bind(announcement.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<Announcement> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (i32, i32, Option<i64>)>(
            "SELECT is_pinned, is_archived, pin_position FROM announcements WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;
        let (is_pinned, is_archived, pin_position) = current;

        if pinned {
            if is_archived != 0 {
                return Err(AppError::Validation(
                    "Archived announcements cannot be pinned".to_string(),
                ));
            }
            if is_pinned == 0 {
                let pinned_count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM announcements WHERE is_pinned = 1 AND is_archived = 0 AND id != ?",
                )
                .bind(id.to_string())
                .fetch_one(&mut *tx)
                .await?;

                if pinned_count >= MAX_PINNED {
                    return Err(AppError::Capacity(format!(
                        "Pin limit reached (max {} pinned announcements)",
                        MAX_PINNED
                    )));
                }

                sqlx::query(
                    "UPDATE announcements SET is_pinned = 1, pin_position = ?, updated_at = ? WHERE id = ?",
                )
                .bind(pinned_count + 1)
                .bind(Utc::now().naive_utc())
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
            }
        } else if is_pinned != 0 {
            sqlx::query(
                "UPDATE announcements SET is_pinned = 0, pin_position = NULL, updated_at = ? WHERE id = ?",
            )
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

            // Keep positions dense among the remaining pinned set.
            if let Some(position) = pin_position {
                sqlx::query(
                    r#"
                    UPDATE announcements SET pin_position = pin_position - 1
                    WHERE is_pinned = 1 AND is_archived = 0 AND pin_position > ?
                    "#,
                )
                .bind(position)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    async fn set_archived(&self, id: Uuid, archived: bool) -> Result<Announcement> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (i32, Option<i64>)>(
            "SELECT is_pinned, pin_position FROM announcements WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;
        let (is_pinned, pin_position) = current;

        if archived {
            // Archiving always forces the pin off.
            sqlx::query(
                r#"
                UPDATE announcements
                SET is_archived = 1, archived_at = ?, is_pinned = 0, pin_position = NULL, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(Utc::now().naive_utc())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

            if is_pinned != 0 {
                if let Some(position) = pin_position {
                    sqlx::query(
                        r#"
                        UPDATE announcements SET pin_position = pin_position - 1
                        WHERE is_pinned = 1 AND is_archived = 0 AND pin_position > ?
                        "#,
                    )
                    .bind(position)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        } else {
            // Unarchiving does not restore any previous pin state.
            sqlx::query(
                "UPDATE announcements SET is_archived = 0, archived_at = NULL, updated_at = ? WHERE id = ?",
            )
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    async fn set_expiry(&self, id: Uuid, last_for: LastFor, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE announcements
            SET last_for_value = ?, last_for_unit = ?, expires_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(last_for.value)
        .bind(last_for.unit.as_str())
        .bind(expires_at.naive_utc())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO read_receipts (announcement_id, user_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(at.naive_utc())
        .execute(&self.pool)
        .await?
        .rows_affected();

        // View count only moves on a first read.
        if inserted == 1 {
            sqlx::query("UPDATE announcements SET view_count = view_count + 1 WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        }

        Ok(inserted == 1)
    }

    async fn record_broadcast(&self, id: Uuid, at: DateTime<Utc>, recipients: &[Uuid]) -> Result<()> {
        let snapshot = serde_json::to_string(recipients)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE announcements
            SET broadcasted_at = ?, broadcasted_to = ?, is_scheduled = 0, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at.naive_utc())
        .bind(&snapshot)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Announcement>> {
        let rows = sqlx::query_as::<_, AnnouncementRow>(&format!(
            r#"
            SELECT {} FROM announcements
            WHERE is_scheduled = 1 AND scheduled_for <= ? AND broadcasted_at IS NULL
            ORDER BY scheduled_for ASC
            "#,
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        let mut due = Vec::with_capacity(rows.len());
        for row in rows {
            due.push(self.hydrate(Self::row_to_announcement(row)?).await?);
        }
        Ok(due)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // Sub-collections go with the aggregate (ON DELETE CASCADE is not
        // always enabled on sqlite connections, so delete explicitly).
        let mut tx = self.pool.begin().await?;
        let id_str = id.to_string();

        sqlx::query("DELETE FROM attachments WHERE announcement_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE announcement_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reactions WHERE announcement_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM read_receipts WHERE announcement_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_attachment(&self, attachment: &Attachment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attachments (
                id, announcement_id, public_id, resource_type, original_name,
                file_hash, uploaded_by, tag, is_deleted, deleted_at, deleted_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, NULL, ?)
            "#,
        )
        .bind(attachment.id.to_string())
        .bind(attachment.announcement_id.to_string())
        .bind(&attachment.public_id)
        .bind(attachment.resource_type.as_str())
        .bind(&attachment.original_name)
        .bind(&attachment.file_hash)
        .bind(attachment.uploaded_by.to_string())
        .bind(attachment.tag.as_str())
        .bind(attachment.created_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // The partial unique index on (announcement_id, file_hash)
            // catches duplicates racing past the application-level check.
            sqlx::Error::Database(db) if db.message().contains("UNIQUE") => {
                AppError::Conflict("Duplicate attachment content".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

        Ok(())
    }

    async fn live_attachment_hashes(&self, announcement_id: Uuid) -> Result<Vec<String>> {
        let hashes = sqlx::query_scalar::<_, String>(
            "SELECT file_hash FROM attachments WHERE announcement_id = ? AND is_deleted = 0",
        )
        .bind(announcement_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(hashes)
    }

    async fn find_attachment(&self, id: Uuid) -> Result<Option<Attachment>> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, announcement_id, public_id, resource_type, original_name,
                   file_hash, uploaded_by, tag, is_deleted, deleted_at, deleted_by, created_at
            FROM attachments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_attachment).transpose()
    }

    async fn soft_delete_attachment(&self, id: Uuid, by: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE attachments SET is_deleted = 1, deleted_at = ?, deleted_by = ? WHERE id = ?",
        )
        .bind(at.naive_utc())
        .bind(by.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn restore_attachment(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE attachments SET is_deleted = 0, deleted_at = NULL, deleted_by = NULL WHERE id = ?",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // Restoring may collide with a live attachment that has the
            // same content hash.
            sqlx::Error::Database(db) if db.message().contains("UNIQUE") => {
                AppError::Conflict("A live attachment with identical content exists".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

        Ok(())
    }

    async fn remove_attachment(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_attachment_tag(&self, id: Uuid, tag: AttachmentTag) -> Result<()> {
        sqlx::query("UPDATE attachments SET tag = ? WHERE id = ?")
            .bind(tag.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_attachments(&self, announcement_id: Uuid, include_deleted: bool) -> Result<Vec<Attachment>> {
        let mut sql = String::from(
            r#"
            SELECT id, announcement_id, public_id, resource_type, original_name,
                   file_hash, uploaded_by, tag, is_deleted, deleted_at, deleted_by, created_at
            FROM attachments
            WHERE announcement_id = ?
            "#,
        );
        if !include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let rows = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(announcement_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_attachment).collect()
    }

    async fn add_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, announcement_id, author, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(comment.id.to_string())
        .bind(comment.announcement_id.to_string())
        .bind(comment.author.to_string())
        .bind(&comment.body)
        .bind(comment.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, announcement_id, author, body, created_at FROM comments WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_comment).transpose()
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn add_reaction(&self, announcement_id: Uuid, emoji: Emoji, user_id: Uuid) -> Result<()> {
        // Repeated adds by the same user are no-ops.
        sqlx::query(
            "INSERT OR IGNORE INTO reactions (announcement_id, emoji, user_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(announcement_id.to_string())
        .bind(emoji.as_str())
        .bind(user_id.to_string())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_reaction(&self, announcement_id: Uuid, emoji: Emoji, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM reactions WHERE announcement_id = ? AND emoji = ? AND user_id = ?")
            .bind(announcement_id.to_string())
            .bind(emoji.as_str())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_reactions(&self, announcement_id: Uuid) -> Result<Vec<Reaction>> {
        let rows = sqlx::query_as::<_, ReactionRow>(
            r#"
            SELECT emoji, user_id FROM reactions
            WHERE announcement_id = ?
            ORDER BY emoji ASC, created_at ASC
            "#,
        )
        .bind(announcement_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut reactions: Vec<Reaction> = Vec::new();
        for row in rows {
            let emoji = Emoji::parse(&row.emoji)
                .ok_or_else(|| AppError::Database(format!("Invalid emoji: {}", row.emoji)))?;
            let user_id = Self::parse_uuid(&row.user_id)?;

            match reactions.iter_mut().find(|r| r.emoji == emoji) {
                Some(reaction) => {
                    reaction.users.push(user_id);
                    reaction.count += 1;
                }
                None => reactions.push(Reaction { emoji, users: vec![user_id], count: 1 }),
            }
        }
        Ok(reactions)
    }
}
