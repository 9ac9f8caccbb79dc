use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockflow_core::DomainError;
use stockflow_infra::EngineError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        EngineError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        EngineError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        EngineError::InsufficientStock {
            item,
            available,
            requested,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!(
                    "insufficient stock for item {item}: available {available}, requested {requested}"
                ),
                "item_id": item,
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        EngineError::ConflictRetry(msg) => json_error(StatusCode::CONFLICT, "conflict_retry", msg),
        EngineError::ItemInUse { item, movements } => json_error(
            StatusCode::CONFLICT,
            "item_in_use",
            format!("item {item} is referenced by {movements} movement(s)"),
        ),
        EngineError::Invariant(msg) => {
            tracing::error!(error = %msg, "invariant violated");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
        EngineError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed JSON bodies are validation errors, not axum's default plain-text 4xx.
pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

/// Parse a path or body identifier, mapping failure to `invalid_id`.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
