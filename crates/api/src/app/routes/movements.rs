use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockflow_core::RequestContext;
use stockflow_inventory::{MovementId, MovementKind};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn inbound_router() -> Router {
    Router::new().route("/", get(list_inbound).post(create_inbound))
}

pub fn outbound_router() -> Router {
    Router::new().route("/", get(list_outbound).post(create_outbound))
}

/// Kind-agnostic access by movement id.
pub fn router() -> Router {
    Router::new().route(
        "/:id",
        get(get_movement).put(edit_movement).delete(delete_movement),
    )
}

pub async fn create_inbound(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<dto::CreateInboundRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let record = match body.into_record() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.engine.create_inbound(&ctx, record).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn create_outbound(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<dto::CreateOutboundRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let record = match body.into_record() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.engine.create_outbound(&ctx, record).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_inbound(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    list_with_names(services, MovementKind::Inbound).await
}

pub async fn list_outbound(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    list_with_names(services, MovementKind::Outbound).await
}

async fn list_with_names(services: Arc<AppServices>, kind: MovementKind) -> axum::response::Response {
    match services.queries.movements_with_item_names(kind).await {
        Ok(rows) => (StatusCode::OK, Json(dto::list(rows))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MovementId = match errors::parse_id(&id, "movement") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.queries.movement(id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn edit_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::EditMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: MovementId = match errors::parse_id(&id, "movement") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let edit = match body.into_edit() {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    match services.engine.edit_movement(&ctx, id, edit).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Returns the reversed balances so clients need no second round trip.
pub async fn delete_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MovementId = match errors::parse_id(&id, "movement") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.delete_movement(&ctx, id).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
