//! Mapping from core errors to HTTP responses.
//!
//! Every error body is `{"detail": "<message>"}`.

use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use calcboard_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A failure reported by the core library
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request could not be decoded
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// Missing or malformed `Authorization` header
    #[error("not authenticated")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::AuthFailure(_)) | ApiError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Core(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected { status, .. } => *status,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Core(CoreError::NotFound) => "Calculation not found.".to_string(),
            ApiError::Core(CoreError::InvalidId(_)) => "Invalid calculation id format.".to_string(),
            ApiError::Core(CoreError::AuthFailure(message)) => message.clone(),
            ApiError::Core(CoreError::Validation(message)) => message.clone(),
            ApiError::Core(e) if e.is_client_error() => e.to_string(),
            ApiError::Core(_) | ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(serde_json::json!({ "detail": self.detail() }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}
