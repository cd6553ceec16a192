//! HTTP error mapping for the gateway.

use axum::Json;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{AuthError, RegistryError, RuntimeError};

/// Message returned for every rejected credential, whatever the cause.
pub const UNAUTHORIZED_MESSAGE: &str = "Could not validate credentials";

/// Everything a gateway route can fail with.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unauthorized: {0}")]
    Unauthorized(AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::Runtime(RuntimeError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Runtime(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => Self::NotFound("Build ID not found".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            // The reason stays in the server log; callers learn nothing about
            // why their credential failed.
            Self::Unauthorized(_) => json!({ "error": UNAUTHORIZED_MESSAGE }),
            Self::Runtime(RuntimeError::Compose { action, stderr }) => json!({
                "error": format!("Compose {} failed", action),
                "stderr": stderr,
            }),
            other => json!({ "error": other.to_string() }),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
