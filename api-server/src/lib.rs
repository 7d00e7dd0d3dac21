pub mod handlers;

use analysis_pipeline::AnalysisOrchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use reddit_client::CommunitySuggester;
use status_store::StatusStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub status: Arc<dyn StatusStore>,
    pub suggester: Arc<dyn CommunitySuggester>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/analysis",
            post(handlers::submit_analysis).get(handlers::list_recent),
        )
        .route("/v1/analysis/{id}", get(handlers::get_status))
        .route("/v1/communities/search", get(handlers::search_communities))
        .route("/health/live", get(handlers::live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
