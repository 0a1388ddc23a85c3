//! Liveness endpoint.

use crate::error::{api_success, ApiResponse};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<ApiResponse<HealthData>> {
    Json(api_success(HealthData {
        status: "healthy",
        service: "tradegate",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
