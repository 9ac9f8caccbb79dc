//! HTTP API: server, routing, and request/response mapping.

pub mod app;
pub mod context;
pub mod middleware;

/// Listen address override.
pub const ENV_BIND: &str = "STOCKFLOW_BIND";

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
