use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::responses::problem;
use crate::AppState;

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Snapshot of the audit ledger tail plus a chain verification flag.
#[utoipa::path(
    get,
    path = "/state/audit",
    tag = "Meta",
    responses((status = 200, description = "Recent audit entries", body = serde_json::Value))
)]
pub async fn state_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let entries = match state.kernel().recent_audit_async(limit).await {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(%err, "failed to read audit ledger");
            return problem(StatusCode::INTERNAL_SERVER_ERROR, "Error", None);
        }
    };
    let chain_ok = state
        .kernel()
        .verify_audit_chain_async()
        .await
        .unwrap_or(false);
    Json(json!({"items": entries, "chain_ok": chain_ok})).into_response()
}

/// Drop the cached schema validator; the next operation reloads the active
/// row from the registry. Used after external schema rotation.
#[utoipa::path(
    post,
    path = "/admin/schema/reload",
    tag = "Meta",
    responses((status = 200, description = "Cache invalidated", body = serde_json::Value))
)]
pub async fn schema_reload(State(state): State<AppState>) -> impl IntoResponse {
    state.gatekeeper().invalidate_schema().await;
    Json(json!({"ok": true}))
}
