use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::{PriceError, StoreError};

/// Errors surfaced by HTTP handlers, rendered as `{error, message}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The remote price source failed; `label` names what was being fetched
    #[error("{message}")]
    Upstream { label: &'static str, message: String },

    #[error(transparent)]
    Persistence(StoreError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn status_and_label(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "Duplicate favorite"),
            Self::Upstream { label, .. } => (StatusCode::INTERNAL_SERVER_ERROR, label),
            Self::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = self.status_and_label();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = label, message = %message, "Request failed");
        }

        let body = json!({ "error": label, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => Self::Conflict(e.to_string()),
            StoreError::Database(_) => Self::Persistence(e),
        }
    }
}

impl From<PriceError> for ApiError {
    fn from(e: PriceError) -> Self {
        let label = match e {
            PriceError::InvalidInput(msg) => return Self::Validation(msg),
            PriceError::Store(store) => return store.into(),
            PriceError::PriceFetchFailed { .. } => "Failed to fetch price data",
            PriceError::PriceHistoryFetchFailed { .. } => "Failed to fetch price history",
            PriceError::ListingFetchFailed(_) => "Failed to fetch cryptocurrencies",
        };
        Self::Upstream {
            label,
            message: e.to_string(),
        }
    }
}
