pub mod assignment;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod hooks;
pub mod mail;
pub mod markup;
pub mod routes;
pub mod state;
pub mod storage;
pub mod templates;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<state::AppState>) -> Router {
    routes::router(state.config.max_upload_bytes)
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
