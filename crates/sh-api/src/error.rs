//! API Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sh_common::StoreHooksError;
use tracing::error;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Wraps any handler error; `StoreHooksError` variants pick the status code
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    /// Extractor rejection (bad path segment, query or JSON body) as a 400
    pub fn rejected(rejection: impl std::fmt::Display) -> Self {
        Self(StoreHooksError::validation(rejection.to_string()).into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self.0.downcast_ref::<StoreHooksError>() {
            Some(StoreHooksError::HookNotFound(_)) | Some(StoreHooksError::HistoryNotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            Some(StoreHooksError::Validation { .. }) | Some(StoreHooksError::Template(_)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let body = ErrorBody {
            error: code.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(StoreHooksError::HistoryNotFound(3));
        assert_eq!(not_found.status_and_code().0, StatusCode::NOT_FOUND);

        let invalid = ApiError::from(StoreHooksError::validation("bad"));
        assert_eq!(invalid.status_and_code().0, StatusCode::BAD_REQUEST);

        let rejected = ApiError::rejected("Cannot parse \"abc\" to a i64");
        assert_eq!(rejected.status_and_code(), (StatusCode::BAD_REQUEST, "BAD_REQUEST"));

        let other = ApiError::from(anyhow::anyhow!("database down"));
        assert_eq!(other.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
