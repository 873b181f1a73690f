pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{inference::ClassificationPipeline, utils::error::ClassifyError, Config, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<ClassificationPipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: ClassificationPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}

pub async fn serve(state: AppState) -> Result<()> {
    let bind_addr = state.config.server_config.bind_addr.clone();
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| ClassifyError::Config(format!("Invalid bind address {}: {}", bind_addr, e)))?;

    let app = create_app(state);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict   - Classify image by url or base64");
    tracing::info!("  GET  /health    - Health check");
    tracing::info!("  GET  /api/info  - Model information");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ClassifyError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifyError::Internal(format!("Server failed: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;
    let body_limit = server_config.max_request_size;
    let timeout = Duration::from_secs(server_config.request_timeout);

    Router::new()
        .route("/predict", post(handlers::predict_handler))
        .route("/health", get(handlers::health_handler))
        .route("/api/info", get(handlers::info_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
