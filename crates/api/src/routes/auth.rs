use crate::auth::{AuthService, LoginRequest, LoginResponse, RegisterRequest};
use crate::error::ApiResult;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;
use tracing::info;

pub fn routes(auth_service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(auth_service)
}

async fn register(
    State(auth): State<Arc<AuthService>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = auth.register(request).await?;
    info!("New student registered: {}", response.user.id);
    Ok(Json(response))
}

async fn login(
    State(auth): State<Arc<AuthService>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = auth.login(request).await?;
    Ok(Json(response))
}
