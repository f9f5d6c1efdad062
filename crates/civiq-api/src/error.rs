//! Error mapping for the HTTP surface

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use civiq_core::Error;
use serde::Serialize;

/// JSON body of every failing response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Wraps a core error so handlers can bubble it with `?`
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
