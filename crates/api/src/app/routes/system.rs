use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Recompute balances from the ledgers and report any drift.
pub async fn consistency(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.queries.consistency_report().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
