use axum::{http::StatusCode, response::IntoResponse, Json};
use jade_core::GatekeeperError;
use jade_protocol::ProblemDetails;

pub fn problem(status: StatusCode, title: &str, detail: Option<&str>) -> axum::response::Response {
    (
        status,
        Json(ProblemDetails {
            r#type: "about:blank".into(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.map(|s| s.to_string()),
        }),
    )
        .into_response()
}

/// Map core errors to transport responses. Rejections surface a generic
/// message that deliberately omits the matched keyword; infrastructure
/// failures surface no internals.
pub fn error_response(err: GatekeeperError) -> axum::response::Response {
    match err {
        GatekeeperError::NotFound => problem(StatusCode::NOT_FOUND, "Not Found", None),
        GatekeeperError::ValidationFailed(message) => problem(
            StatusCode::BAD_REQUEST,
            "Validation Failed",
            Some(&message),
        ),
        GatekeeperError::QueryRejected => problem(
            StatusCode::BAD_REQUEST,
            "Bad Request",
            Some("Query type not supported"),
        ),
        GatekeeperError::MalformedRequest(message) => {
            problem(StatusCode::BAD_REQUEST, "Bad Request", Some(&message))
        }
        GatekeeperError::InvalidSchema(message) => {
            tracing::error!(%message, "schema registry unusable");
            problem(StatusCode::INTERNAL_SERVER_ERROR, "Error", None)
        }
        GatekeeperError::Infrastructure(message) => {
            tracing::error!(%message, "infrastructure failure");
            problem(StatusCode::INTERNAL_SERVER_ERROR, "Error", None)
        }
    }
}
