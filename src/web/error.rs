//! Web API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::ApiResponse;
use crate::guard::GuardError;
use crate::whitelist::WhitelistError;

/// Errors returned by the web API and server.
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// The request body or query was unusable.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Server error.
    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

impl From<WhitelistError> for WebError {
    fn from(err: WhitelistError) -> Self {
        Self::Guard(GuardError::Whitelist(err))
    }
}

impl WebError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Guard(GuardError::Whitelist(err)) => match err {
                WhitelistError::Validation(_) => StatusCode::BAD_REQUEST,
                WhitelistError::NotFound(_) => StatusCode::NOT_FOUND,
                WhitelistError::DuplicateEntry(_) => StatusCode::CONFLICT,
                WhitelistError::CorruptStore { .. } | WhitelistError::Unavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                WhitelistError::Persistence { .. } | WhitelistError::Serialize(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Guard(_) | Self::Bind { .. } | Self::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let message = status.canonical_reason().unwrap_or("Error");
        (status, Json(ApiResponse::error(message, self.to_string()))).into_response()
    }
}
