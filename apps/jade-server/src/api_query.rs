use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use jade_core::GatekeeperError;
use jade_protocol::{QueryRequest, QueryResponse, NOT_AVAILABLE_TEXT};

use crate::app_state::QUERY_ACTOR;
use crate::responses::error_response;
use crate::AppState;

/// Deterministic field query. The guard evaluates the field path before any
/// record is fetched; rejections are audited and surface a generic message.
#[utoipa::path(
    post,
    path = "/query",
    tag = "Queries",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Resolved answer", body = QueryResponse),
        (status = 400, description = "Missing parameters or disallowed query"),
        (status = 404, description = "Unknown or deleted record")
    )
)]
pub async fn query_record(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    // Empty strings count as absent, matching the required-parameter check.
    let (Some(record_id), Some(field)) = (
        req.record_id.filter(|s| !s.is_empty()),
        req.field.filter(|s| !s.is_empty()),
    ) else {
        return error_response(GatekeeperError::MalformedRequest(
            "record_id and field required".into(),
        ));
    };
    match state
        .gatekeeper()
        .query_field(&record_id, &field, QUERY_ACTOR)
        .await
    {
        Ok(answer) => Json(QueryResponse {
            record_id,
            field,
            answer: answer.into_answer(NOT_AVAILABLE_TEXT),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}
