//! HTTP front end serving pipeline requests

/// axum router and server lifecycle
pub mod http_server;

pub use http_server::{HttpServerApp, router};
