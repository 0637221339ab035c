use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Bullhorn API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Announcement distribution engine",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "announcements": "/announcements"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
