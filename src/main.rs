use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bullhorn::{
    api, auth,
    config::Settings,
    fanout::{
        realtime::{HttpRealtimePublisher, NoopPublisher, RealtimePublisher},
        EmailDispatcher, Fanout, ReadCache,
    },
    repository::{
        SqliteAnnouncementRepository, SqliteNotificationRepository, SqliteUserRepository,
    },
    service::ServiceContext,
    storage::LocalBlobStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bullhorn=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Bullhorn server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let auth_service = Arc::new(auth::AuthService::new(db_pool.clone()));

    // Repositories
    let user_repo = Arc::new(SqliteUserRepository::new(db_pool.clone()));
    let announcement_repo = Arc::new(SqliteAnnouncementRepository::new(db_pool.clone()));
    let notification_repo = Arc::new(SqliteNotificationRepository::new(db_pool.clone()));

    let blob_store = Arc::new(LocalBlobStore::new(
        settings.storage.uploads_dir.clone(),
        settings.storage.max_file_size_mb,
    ));

    // Side channels
    let publisher: Arc<dyn RealtimePublisher> =
        match HttpRealtimePublisher::new(&settings.realtime) {
            Some(publisher) => {
                tracing::info!("Realtime publishing enabled");
                Arc::new(publisher)
            }
            None => {
                tracing::info!("Realtime publishing disabled");
                Arc::new(NoopPublisher)
            }
        };

    let mailer = EmailDispatcher::new(&settings.smtp).map(Arc::new);
    if mailer.is_some() {
        tracing::info!("Email dispatch enabled");
    } else {
        tracing::info!("Email dispatch disabled");
    }

    let cache = Arc::new(ReadCache::new());

    let fanout = Arc::new(Fanout::new(
        user_repo.clone(),
        announcement_repo.clone(),
        notification_repo.clone(),
        publisher,
        cache,
        mailer,
    ));

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        user_repo,
        announcement_repo,
        notification_repo,
        blob_store,
        fanout,
        auth_service,
        db_pool.clone(),
    ));

    // Scheduled-broadcast sweeper
    {
        let announcements = service_context.announcement_service.clone();
        let interval = Duration::from_secs(settings.scheduler.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match announcements.broadcast_due().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!("Broadcast {} scheduled announcement(s)", n),
                    Err(e) => tracing::error!("Scheduled broadcast sweep failed: {}", e),
                }
            }
        });
    }

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
