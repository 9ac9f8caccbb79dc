use axum::{http::StatusCode, middleware::Next, response::Response};

use crate::app::errors;
use crate::context::request_context;

/// Require a valid `X-Actor-Id` header and expose it as a `RequestContext` extension.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let ctx = request_context(req.headers()).ok_or_else(|| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid X-Actor-Id header",
        )
    })?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
