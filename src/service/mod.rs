pub mod announcement_service;
pub mod attachment_service;
pub mod engagement_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::AuthService;
use crate::fanout::Fanout;
use crate::repository::*;
use crate::storage::BlobStore;

pub use announcement_service::{AnnouncementService, CreateOutcome};
pub use attachment_service::{AttachmentListing, AttachmentService, UploadFailure, UploadFile, UploadOutcome};
pub use engagement_service::EngagementService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub announcement_repo: Arc<dyn AnnouncementRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub auth_service: Arc<AuthService>,
    pub fanout: Arc<Fanout>,
    pub announcement_service: Arc<AnnouncementService>,
    pub attachment_service: Arc<AttachmentService>,
    pub engagement_service: Arc<EngagementService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        announcement_repo: Arc<dyn AnnouncementRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
        blob_store: Arc<dyn BlobStore>,
        fanout: Arc<Fanout>,
        auth_service: Arc<AuthService>,
        db_pool: SqlitePool,
    ) -> Self {
        let attachment_service = Arc::new(AttachmentService::new(
            announcement_repo.clone(),
            blob_store.clone(),
            fanout.clone(),
        ));
        let announcement_service = Arc::new(AnnouncementService::new(
            announcement_repo.clone(),
            user_repo.clone(),
            blob_store,
            attachment_service.clone(),
            fanout.clone(),
        ));
        let engagement_service = Arc::new(EngagementService::new(
            announcement_repo.clone(),
            fanout.clone(),
        ));

        Self {
            user_repo,
            announcement_repo,
            notification_repo,
            auth_service,
            fanout,
            announcement_service,
            attachment_service,
            engagement_service,
            db_pool,
        }
    }
}
