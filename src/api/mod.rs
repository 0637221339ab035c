pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    // Multipart bodies carry up to a full batch of files.
    let body_limit = settings.storage.max_file_size_mb
        * 1024
        * 1024
        * settings.storage.max_files_per_request
        + 64 * 1024;

    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .nest("/announcements", announcement_routes(app_state.clone()))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn announcement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::announcements::list))
        .route("/", post(handlers::announcements::create))
        .route("/:id", get(handlers::announcements::get))
        .route("/:id", put(handlers::announcements::update))
        .route("/:id", delete(handlers::announcements::delete))
        .route("/:id/pin", put(handlers::announcements::pin))
        .route("/:id/archive", put(handlers::announcements::archive))
        .route("/:id/extend-expiry", put(handlers::announcements::extend_expiry))
        // Engagement
        .route("/:id/comments", post(handlers::engagement::add_comment))
        .route("/:id/comments/:comment_id", delete(handlers::engagement::delete_comment))
        .route("/:id/reactions", post(handlers::engagement::add_reaction))
        .route("/:id/reactions/:emoji", delete(handlers::engagement::remove_reaction))
        // Attachments
        .route("/:id/attachments", post(handlers::attachments::upload))
        .route("/:id/attachments", get(handlers::attachments::list))
        .route("/:id/attachments/:attachment_id", delete(handlers::attachments::delete))
        .route("/:id/attachments/:attachment_id/restore", put(handlers::attachments::restore))
        .route("/:id/attachments/:attachment_id/tag", put(handlers::attachments::set_tag))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}
