pub mod auth;
pub mod bookings;
pub mod chat;
pub mod health;

use crate::auth::AuthService;
use axum::{Extension, Router};
use baodao_core::TalkCore;
use std::sync::Arc;

pub fn create_routes(core: Arc<TalkCore>, auth_service: Arc<AuthService>) -> Router {
    Router::new()
        // Health check routes (no authentication required)
        .nest("/health", health::routes(core.clone()))
        // Registration and login
        .nest("/auth", auth::routes(auth_service.clone()))
        // Protected routes; the extractor reads the auth service from the
        // request extensions.
        .nest("/api/v1/chat", chat::routes(core.clone()))
        .nest("/api/v1/bookings", bookings::routes(core))
        .layer(Extension(auth_service))
}

pub async fn not_found_handler() -> axum::http::StatusCode {
    axum::http::StatusCode::NOT_FOUND
}
