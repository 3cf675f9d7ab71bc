use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jade_protocol::{CreateRecordResponse, RecordResponse};
use serde_json::Value;

use crate::app_state::{OPERATOR_ACTOR, QUERY_ACTOR};
use crate::responses::error_response;
use crate::AppState;

/// Validate a candidate record against the active schema and store it.
#[utoipa::path(
    post,
    path = "/records",
    tag = "Records",
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Stored", body = CreateRecordResponse),
        (status = 400, description = "Payload violates the active schema")
    )
)]
pub async fn create_record(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    match state.gatekeeper().create_record(payload, OPERATOR_ACTOR).await {
        Ok(record_id) => (
            StatusCode::CREATED,
            Json(CreateRecordResponse {
                record_id,
                status: "stored".into(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// Read a record's data tree (read-only; soft-deleted records are 404).
#[utoipa::path(
    get,
    path = "/records/{id}",
    tag = "Records",
    responses(
        (status = 200, description = "Record data", body = RecordResponse),
        (status = 404, description = "Unknown or deleted record")
    )
)]
pub async fn read_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.gatekeeper().read_record(&id, QUERY_ACTOR).await {
        Ok(data) => Json(RecordResponse {
            record_id: id,
            data,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}
