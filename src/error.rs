//! HTTP error taxonomy for the API surface.
//!
//! Client input problems map to 400, a missing API key to 503, upstream model
//! failures to 502 and everything unexpected to 500. Every error is returned
//! to the caller as a `{"detail": "..."}` body.

use crate::agent::AgentError;
use crate::extract::ExtractError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid caller input (empty text, wrong file type, oversized upload,
    /// unreadable PDF)
    #[error("{0}")]
    InvalidInput(String),
    /// The service started without a usable API key
    #[error("AI components not initialized. Please check your API key.")]
    NotInitialized,
    /// The model provider failed or timed out after the retry
    #[error("Error generating summary: {0}")]
    Upstream(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, detail = %body.detail, "request failed");
        } else {
            tracing::debug!(status = %status, detail = %body.detail, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::RequestFailed(_) | AgentError::TimedOut(_) => {
                ApiError::Upstream(err.to_string())
            }
            AgentError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        ApiError::InvalidInput(format!("Error reading PDF: {}", err))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
