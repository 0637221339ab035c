use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config::RealtimeConfig,
    error::{AppError, Result},
};

/// Event catalog. Every payload carries the announcement id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    CommentAdded,
    CommentDeleted,
    ReactionAdded,
    ReactionRemoved,
    PinToggled,
    Archived,
    ExpiryExtended,
    AttachmentsAdded,
    AttachmentDeleted,
    AttachmentRestored,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created => "announcement-created",
            EventKind::Updated => "announcement-updated",
            EventKind::Deleted => "announcement-deleted",
            EventKind::CommentAdded => "announcement-comment-added",
            EventKind::CommentDeleted => "announcement-comment-deleted",
            EventKind::ReactionAdded => "announcement-reaction-added",
            EventKind::ReactionRemoved => "announcement-reaction-removed",
            EventKind::PinToggled => "announcement-pin-toggled",
            EventKind::Archived => "announcement-archived",
            EventKind::ExpiryExtended => "announcement-expiry-extended",
            EventKind::AttachmentsAdded => "announcement-attachments-added",
            EventKind::AttachmentDeleted => "announcement-attachment-deleted",
            EventKind::AttachmentRestored => "announcement-attachment-restored",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub event: &'static str,
    pub announcement_id: Uuid,
    pub payload: Value,
}

impl RealtimeEvent {
    pub fn new(kind: EventKind, announcement_id: Uuid, payload: Value) -> Self {
        Self {
            event: kind.name(),
            announcement_id,
            payload,
        }
    }
}

/// Publish contract to the realtime transport. The transport itself
/// (socket rooms, delivery) is an external collaborator; publishes are
/// at-most-once and never awaited for acknowledgment beyond the HTTP
/// round-trip.
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<()>;
}

/// Pushes events to the realtime gateway over HTTP.
pub struct HttpRealtimePublisher {
    client: reqwest::Client,
    publish_url: String,
}

impl HttpRealtimePublisher {
    pub fn new(config: &RealtimeConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        config.publish_url.clone().map(|publish_url| Self {
            client: reqwest::Client::new(),
            publish_url,
        })
    }
}

#[async_trait]
impl RealtimePublisher for HttpRealtimePublisher {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<()> {
        let body = serde_json::json!({
            "channel": channel,
            "event": event,
        });

        let response = self
            .client
            .post(&self.publish_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Realtime publish failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Realtime gateway returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Used when no realtime gateway is configured.
pub struct NoopPublisher;

#[async_trait]
impl RealtimePublisher for NoopPublisher {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<()> {
        tracing::debug!("Realtime disabled; dropping {} on {}", event.event, channel);
        Ok(())
    }
}

/// Records everything published; test fixture.
#[cfg(any(test, feature = "test-utils"))]
pub struct RecordingPublisher {
    pub published: tokio::sync::Mutex<Vec<(String, RealtimeEvent)>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RealtimePublisher for RecordingPublisher {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<()> {
        self.published
            .lock()
            .await
            .push((channel.to_string(), event.clone()));
        Ok(())
    }
}

/// Always fails; exercises the fanout's failure containment.
#[cfg(any(test, feature = "test-utils"))]
pub struct FailingPublisher;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RealtimePublisher for FailingPublisher {
    async fn publish(&self, _channel: &str, _event: &RealtimeEvent) -> Result<()> {
        Err(AppError::External("publisher down".to_string()))
    }
}
