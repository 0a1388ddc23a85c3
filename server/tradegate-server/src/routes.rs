//! Route table.

use crate::handlers;
use crate::middleware::auth_guard;
use crate::server::GatewayServer;
use axum::routing::{get, post};
use axum::{middleware, Router};

/// Route paths, collected so handlers, tests, and clients agree.
pub mod paths {
    pub const LOGIN: &str = "/login";
    pub const LOGOUT: &str = "/logout";
    pub const HEALTH: &str = "/health";
    pub const CHECK: &str = "/check";
    pub const ME: &str = "/me";
    pub const VALIDATE: &str = "/validate/:dashboard_type";
    pub const ROUTES: &str = "/routes";
    pub const DASHBOARD_ENTRY: &str = "/:dashboard/dashboard";
}

pub fn create_router(server: GatewayServer) -> Router {
    let public = Router::new()
        .route(paths::LOGIN, post(handlers::auth::login))
        .route(paths::LOGOUT, post(handlers::auth::logout))
        .route(paths::HEALTH, get(handlers::health::health));

    let protected = Router::new()
        .route(paths::CHECK, get(handlers::auth::check))
        .route(paths::ME, get(handlers::auth::me))
        .route(paths::VALIDATE, get(handlers::auth::validate_dashboard))
        .route(paths::ROUTES, get(handlers::auth::routes))
        .route(paths::DASHBOARD_ENTRY, get(handlers::auth::dashboard_entry))
        .route_layer(middleware::from_fn_with_state(server.clone(), auth_guard));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(server)
}
