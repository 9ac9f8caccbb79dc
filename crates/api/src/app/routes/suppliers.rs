use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use stockflow_core::RequestContext;
use stockflow_inventory::SupplierId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/:id", put(update_supplier).delete(delete_supplier))
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<dto::SupplierRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.suppliers.create(&ctx, body.into_details()).await {
        Ok(supplier) => (StatusCode::CREATED, Json(supplier)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_suppliers(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.suppliers.list().await {
        Ok(suppliers) => (StatusCode::OK, Json(dto::list(suppliers))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::SupplierRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: SupplierId = match errors::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.suppliers.update(&ctx, id, body.into_details()).await {
        Ok(supplier) => (StatusCode::OK, Json(supplier)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SupplierId = match errors::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.suppliers.delete(&ctx, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
