use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use bovinext_core::{CoreError, ErrorKind};
use bovinext_protocol::ErrorBody;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Body or query string did not deserialize.
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// A blocking task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            ApiError::Core(CoreError::Dependency { context, detail }) => {
                error!(context, detail = detail.as_str(), "dependency failure");
                (ErrorKind::Dependency, context.to_string())
            }
            ApiError::Core(e) => (e.kind(), e.public_message()),
            ApiError::Malformed(detail) => {
                warn!(detail = detail.as_str(), "malformed request");
                (ErrorKind::Validation, detail)
            }
            ApiError::Internal(detail) => {
                error!(detail = detail.as_str(), "internal error");
                (ErrorKind::Dependency, "internal error".to_string())
            }
        };

        (status_for(kind), Json(ErrorBody::new(kind, message))).into_response()
    }
}
