use crate::{
    auth::AuthService,
    routes::{create_routes, not_found_handler},
    ApiConfig,
};
use axum::{http::Method, Router};
use baodao_core::TalkCore;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

pub struct ApiServer {
    config: ApiConfig,
    core: Arc<TalkCore>,
    auth_service: Arc<AuthService>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, core: Arc<TalkCore>, auth_service: Arc<AuthService>) -> Self {
        Self {
            config,
            core,
            auth_service,
        }
    }

    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.create_app();
        let addr = SocketAddr::new(self.config.host.parse()?, self.config.port);

        info!("Starting API server on {}", addr);
        info!("CORS origins: {:?}", self.config.cors_origins);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        create_routes(self.core.clone(), self.auth_service.clone())
            .fallback(not_found_handler)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        self.config.request_timeout_secs,
                    )))
                    .layer(cors_layer(&self.config)),
            )
    }

    pub fn get_config(&self) -> &ApiConfig {
        &self.config
    }
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: AllowOrigin = if config.cors_origins.contains(&"*".to_string()) {
        Any.into()
    } else {
        config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect::<Vec<_>>()
            .into()
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => tracing::error!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
