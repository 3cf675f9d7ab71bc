use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use jade_core::{ChatOutcome, GatekeeperError};
use jade_protocol::{ChatRequest, ChatResponse, NOT_AVAILABLE_TEXT, UNSUPPORTED_TEXT};
use serde_json::Value;

use crate::app_state::QUERY_ACTOR;
use crate::responses::error_response;
use crate::AppState;

/// Chat surface. A UI adapter only: recognized questions map to field paths,
/// everything else yields the fixed unsupported answer. Rejected and
/// unsupported questions get the same 200-shaped reply so callers cannot
/// probe the guard through status codes.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "Queries",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer or fixed unsupported text", body = ChatResponse),
        (status = 400, description = "Missing parameters"),
        (status = 404, description = "Unknown or deleted record")
    )
)]
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> impl IntoResponse {
    // Empty strings count as absent, matching the required-parameter check.
    let (Some(record_id), Some(question)) = (
        req.record_id.filter(|s| !s.is_empty()),
        req.question.filter(|s| !s.is_empty()),
    ) else {
        return error_response(GatekeeperError::MalformedRequest(
            "record_id and question are required".into(),
        ));
    };
    match state
        .gatekeeper()
        .answer_question(&record_id, &question, QUERY_ACTOR)
        .await
    {
        Ok(ChatOutcome::Answer(resolved)) => {
            let mut answer = resolved.into_answer(NOT_AVAILABLE_TEXT);
            if let Some(rephraser) = state.rephraser() {
                if let Value::String(text) = &answer {
                    answer = Value::String(rephraser.rephrase(text).await);
                }
            }
            Json(ChatResponse {
                record_id,
                question,
                answer,
            })
            .into_response()
        }
        Ok(ChatOutcome::Unsupported) => Json(ChatResponse {
            record_id,
            question,
            answer: Value::String(UNSUPPORTED_TEXT.to_string()),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}
