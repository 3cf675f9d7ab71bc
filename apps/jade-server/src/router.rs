use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{api_chat, api_meta, api_query, api_records, AppState};

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(api_meta::healthz))
        .route("/records", post(api_records::create_record))
        .route("/records/{id}", get(api_records::read_record))
        .route("/query", post(api_query::query_record))
        .route("/chat", post(api_chat::chat))
        .route("/state/audit", get(api_meta::state_audit))
        .route("/admin/schema/reload", post(api_meta::schema_reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
