//! sicop-api library - property valuation and market segmentation service
//!
//! The [`engine::ValuationEngine`] is built once at startup and shared
//! read-only by every handler through [`AppState`].

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod engine;
pub mod error;

pub use engine::ValuationEngine;
pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable valuation context
    pub engine: Arc<ValuationEngine>,
}

impl AppState {
    /// Create new application state
    pub fn new(engine: ValuationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Build application router
///
/// CORS is permissive; the browser frontend is served from another origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::valuation_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
