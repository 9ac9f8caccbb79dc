use axum::{Router, routing::get};

pub mod invoices;
pub mod items;
pub mod movements;
pub mod suppliers;
pub mod system;

/// Router for all endpoints that require an actor.
pub fn router() -> Router {
    Router::new()
        .route("/consistency", get(system::consistency))
        .nest("/items", items::router())
        .nest("/inbound", movements::inbound_router())
        .nest("/outbound", movements::outbound_router())
        .nest("/movements", movements::router())
        .nest("/invoices", invoices::router())
        .nest("/suppliers", suppliers::router())
}
