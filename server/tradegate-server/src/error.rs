use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Whether error responses may carry internal detail. Set once at startup
/// from `GatewayConfig::development_mode`; rendering happens in
/// `IntoResponse` where no config handle is available.
static DEVELOPMENT_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_development_mode(enabled: bool) {
    DEVELOPMENT_MODE.store(enabled, Ordering::Relaxed);
}

/// Stable response envelope shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Build a success envelope around `data`.
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        message: "OK".to_string(),
        data: Some(data),
        code: None,
    }
}

/// Build a success envelope with a message and no data.
pub fn api_message(message: impl Into<String>) -> ApiResponse<()> {
    ApiResponse {
        success: true,
        message: message.into(),
        data: None,
        code: None,
    }
}

/// Gateway error taxonomy.
///
/// Every variant carries a stable machine-readable code; internal detail is
/// only exposed to clients in development mode.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {message}")]
    Authorization {
        message: String,
        /// Where the denied principal actually belongs, when known.
        destination: Option<String>,
    },

    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String, retry_after_secs: u64 },

    #[error("Service error: {0}")]
    Service(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        ApiError::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ApiError::Authorization {
            message: message.into(),
            destination: None,
        }
    }

    pub fn authorization_with_destination(
        message: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        ApiError::Authorization {
            message: message.into(),
            destination: Some(destination.into()),
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        ApiError::RateLimit {
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        ApiError::Service(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    /// Stable error code for programmatic clients.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Authentication(_) => "UNAUTHENTICATED",
            ApiError::Authorization { .. } => "FORBIDDEN",
            ApiError::RateLimit { .. } => "RATE_LIMITED",
            ApiError::Service(_) | ApiError::Internal(_) => "SERVICE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Service(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Service/internal detail is masked outside
    /// development mode; stack traces and secrets never leave the process.
    fn client_message(&self) -> String {
        let development = DEVELOPMENT_MODE.load(Ordering::Relaxed);

        match self {
            ApiError::Service(detail) if !development => {
                tracing::error!(detail = %detail, "service error");
                "Service temporarily unavailable".to_string()
            }
            ApiError::Internal(detail) if !development => {
                tracing::error!(detail = %detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct DeniedData {
    destination: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let message = self.client_message();

        let body = match &self {
            ApiError::Authorization {
                destination: Some(destination),
                ..
            } => Json(ApiResponse {
                success: false,
                message,
                data: Some(DeniedData {
                    destination: destination.clone(),
                }),
                code: Some(code),
            })
            .into_response(),
            _ => Json(ApiResponse::<()> {
                success: false,
                message,
                data: None,
                code: Some(code),
            })
            .into_response(),
        };

        let mut response = (status, body).into_response();
        if let ApiError::RateLimit { retry_after_secs, .. } = self {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
