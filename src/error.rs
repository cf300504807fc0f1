//! Request-level error taxonomy.
//!
//! The `Display` text of each variant is exactly the body sent to the client.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Ways a request can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Bad key, bad payload or short body. The message is the full body.
    #[error("{0}")]
    MalformedRequest(&'static str),

    #[error("not found")]
    NotFound,

    #[error("service unavailable")]
    StoreUnavailable,

    #[error("internal server error")]
    StoreRejected,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("service unavailable: shutting down")]
    ShuttingDown,

    #[error("payload too large")]
    PayloadTooLarge,
}

impl ApiError {
    pub const MALFORMED: ApiError = ApiError::MalformedRequest("malformed request");
    pub const BAD_URL: ApiError = ApiError::MalformedRequest("malformed request - bad url");
    pub const INVALID_LENGTH: ApiError =
        ApiError::MalformedRequest("malformed request - invalid length");
    pub const DID_NOT_VALIDATE: ApiError =
        ApiError::MalformedRequest("malformed request - data did not validate");

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StoreUnavailable | Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::StoreRejected => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
