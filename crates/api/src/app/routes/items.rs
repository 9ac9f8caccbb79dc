use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockflow_core::RequestContext;
use stockflow_infra::ItemView;
use stockflow_inventory::ItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/choices", get(item_choices))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/movements", get(item_movements))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<dto::CreateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.engine.create_item(&ctx, body.into_new_item()).await {
        Ok(receipt) => (StatusCode::CREATED, Json(dto::item_receipt_to_json(&receipt))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_items(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.queries.items().await {
        Ok(items) => (StatusCode::OK, Json(dto::list(items))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Picker entries, sorted by name.
pub async fn item_choices(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.queries.item_choices().await {
        Ok(choices) => (StatusCode::OK, Json(dto::list(choices))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.queries.item(id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.engine.update_item_details(&ctx, id, body.into_details()).await {
        Ok(item) => (StatusCode::OK, Json(ItemView::from(&item))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.delete_item(&ctx, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn item_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.queries.movements_for_item(id).await {
        Ok(rows) => (StatusCode::OK, Json(dto::list(rows))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
