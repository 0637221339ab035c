use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    domain::Notification,
    error::Result,
    repository::NotificationRepository,
};

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn create_batch(&self, notifications: &[Notification]) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for notification in notifications {
            sqlx::query(
                r#"
                INSERT INTO notifications (
                    id, recipient_id, sender_id, announcement_id, kind, message, is_read, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(notification.id.to_string())
            .bind(notification.recipient_id.to_string())
            .bind(notification.sender_id.map(|s| s.to_string()))
            .bind(notification.announcement_id.map(|a| a.to_string()))
            .bind(notification.kind.as_str())
            .bind(&notification.message)
            .bind(if notification.is_read { 1i32 } else { 0i32 })
            .bind(notification.created_at.naive_utc())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
