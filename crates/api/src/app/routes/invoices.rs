use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockflow_inventory::MovementId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Delivery notes derived from outbound movements.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:id", get(get_invoice))
}

pub async fn list_invoices(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.queries.outbound_invoices().await {
        Ok(rows) => (StatusCode::OK, Json(dto::list(rows))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MovementId = match errors::parse_id(&id, "movement") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.queries.outbound_invoice(id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
