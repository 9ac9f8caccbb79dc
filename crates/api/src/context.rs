use axum::http::HeaderMap;

use stockflow_core::{ActorId, RequestContext};

/// Header carrying the caller's identity on every protected request.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Build the request context from headers.
///
/// `None` when the header is missing, not valid UTF-8, or not a UUID.
pub fn request_context(headers: &HeaderMap) -> Option<RequestContext> {
    let raw = headers.get(ACTOR_HEADER)?.to_str().ok()?.trim();
    let actor: ActorId = raw.parse().ok()?;
    Some(RequestContext::new(actor))
}
