use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    domain::{Announcement, DirectoryUser, Notification},
    repository::{AnnouncementRepository, NotificationRepository, UserRepository},
    resolver,
};

pub mod cache;
pub mod email;
pub mod realtime;

pub use cache::ReadCache;
pub use email::EmailDispatcher;
pub use realtime::{EventKind, RealtimeEvent, RealtimePublisher};

/// How wide a cache invalidation a transition needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Structural change: create/update/delete/pin/archive.
    Broad,
    /// Leaf engagement mutation on a single announcement.
    Narrow,
}

/// Turns a committed lifecycle transition into notifications, realtime
/// events and cache invalidations. Every side channel is caught and
/// logged individually; nothing here can fail the primary write, which
/// has already been committed by the time fanout runs.
pub struct Fanout {
    users: Arc<dyn UserRepository>,
    announcements: Arc<dyn AnnouncementRepository>,
    notifications: Arc<dyn NotificationRepository>,
    publisher: Arc<dyn RealtimePublisher>,
    cache: Arc<ReadCache>,
    mailer: Option<Arc<EmailDispatcher>>,
}

impl Fanout {
    pub fn new(
        users: Arc<dyn UserRepository>,
        announcements: Arc<dyn AnnouncementRepository>,
        notifications: Arc<dyn NotificationRepository>,
        publisher: Arc<dyn RealtimePublisher>,
        cache: Arc<ReadCache>,
        mailer: Option<Arc<EmailDispatcher>>,
    ) -> Self {
        Self {
            users,
            announcements,
            notifications,
            publisher,
            cache,
            mailer,
        }
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    /// Immediate-broadcast algorithm: resolve recipients, write one
    /// notification per recipient, publish one recipient-scoped event
    /// each, persist the broadcast snapshot, hand off email dispatch and
    /// admin-interest records to detached tasks, then invalidate broadly.
    pub async fn broadcast_created(&self, announcement: &Announcement, sender: &DirectoryUser) {
        let directory = match self.users.list_directory().await {
            Ok(directory) => directory,
            Err(e) => {
                tracing::error!("Subscriber resolution failed for {}: {}", announcement.id, e);
                self.cache.invalidate_all().await;
                return;
            }
        };

        let recipients: Vec<Uuid> =
            resolver::resolve(&announcement.subscribers, &directory).into_iter().collect();

        let notifications: Vec<Notification> = recipients
            .iter()
            .map(|recipient| {
                Notification::announcement_created(
                    *recipient,
                    sender.id,
                    announcement.id,
                    &announcement.title,
                )
            })
            .collect();
        if let Err(e) = self.notifications.create_batch(&notifications).await {
            tracing::error!("Notification creation failed for {}: {}", announcement.id, e);
        }

        let payload = json!({
            "announcement": announcement,
            "notification": {
                "kind": "announcement_created",
                "sender": sender.id,
                "title": announcement.title,
            },
        });
        let event = RealtimeEvent::new(EventKind::Created, announcement.id, payload);
        for recipient in &recipients {
            if let Err(e) = self.publisher.publish(&format!("user:{}", recipient), &event).await {
                tracing::error!("Realtime publish to user:{} failed: {}", recipient, e);
            }
        }

        if let Err(e) = self
            .announcements
            .record_broadcast(announcement.id, Utc::now(), &recipients)
            .await
        {
            tracing::error!("Failed to record broadcast snapshot for {}: {}", announcement.id, e);
        }

        // Email dispatch is fire-and-forget; the request returns before
        // delivery completes.
        if let Some(mailer) = self.mailer.clone() {
            let users = self.users.clone();
            let recipients = recipients.clone();
            let title = announcement.title.clone();
            let description = announcement.description.clone();
            tokio::spawn(async move {
                let addresses = match users.emails_for_ids(&recipients).await {
                    Ok(addresses) => addresses,
                    Err(e) => {
                        tracing::warn!("Could not load recipient emails: {}", e);
                        return;
                    }
                };
                if let Err(e) = mailer.dispatch(&title, &description, &addresses).await {
                    tracing::warn!("Email dispatch failed: {}", e);
                }
            });
        }

        // Secondary admin-interest records, also detached.
        {
            let users = self.users.clone();
            let notifications = self.notifications.clone();
            let recipients = recipients.clone();
            let sender_id = sender.id;
            let announcement_id = announcement.id;
            let title = announcement.title.clone();
            tokio::spawn(async move {
                let admins = match users.list_admins().await {
                    Ok(admins) => admins,
                    Err(e) => {
                        tracing::warn!("Could not load admins for activity records: {}", e);
                        return;
                    }
                };
                let records: Vec<Notification> = admins
                    .iter()
                    .filter(|admin| admin.id != sender_id && !recipients.contains(&admin.id))
                    .map(|admin| {
                        Notification::announcement_activity(
                            admin.id,
                            sender_id,
                            announcement_id,
                            &title,
                        )
                    })
                    .collect();
                if let Err(e) = notifications.create_batch(&records).await {
                    tracing::warn!("Admin activity records failed: {}", e);
                }
            });
        }

        self.cache.invalidate_all().await;
    }

    /// All non-broadcast transitions: one event on the shared channel
    /// plus a scoped invalidation.
    pub async fn announce_change(
        &self,
        kind: EventKind,
        announcement_id: Uuid,
        payload: Value,
        scope: InvalidationScope,
    ) {
        let event = RealtimeEvent::new(kind, announcement_id, payload);
        if let Err(e) = self.publisher.publish("announcements", &event).await {
            tracing::error!("Realtime publish of {} failed: {}", event.event, e);
        }

        match scope {
            InvalidationScope::Broad => self.cache.invalidate_all().await,
            InvalidationScope::Narrow => self.cache.invalidate_entry(announcement_id).await,
        }
    }
}
