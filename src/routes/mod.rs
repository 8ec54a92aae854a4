//! API Routes
//!
//! - `/api/chat` - Chat widget endpoint
//! - `/api/site-id/{site_id}` - Site notification, refreshes the cached records
//! - `/api/health` - Health check

pub mod chat;
pub mod health;
pub mod sites;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(sites::router(state.clone()))
        .merge(health::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
