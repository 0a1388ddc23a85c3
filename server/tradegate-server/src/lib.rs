//! Tradegate authentication and authorization gateway.
//!
//! Fronts the trade platform's dashboard areas with credential-pair auth
//! (short-lived access, single-use refresh), per-area authorization rules,
//! and destination routing.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod validation;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::GatewayConfig;
pub use server::GatewayServer;

/// Assemble the application with its outer layers.
pub fn create_app(server: GatewayServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    routes::create_router(server)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
