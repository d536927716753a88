use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ErrorResponse;

/// Failure of a generation attempt, split by who is at fault.
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    /// The caller sent something unusable (empty payload, bad extension,
    /// missing input file).
    #[error("{0}")]
    Validation(String),

    /// The renderer or the image pipeline failed.
    #[error("QR code generation failed: {0}")]
    Generation(String),
}

impl QrError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        Self::Generation(err.to_string())
    }
}

/// Errors returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_) | Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QrError> for ApiError {
    fn from(err: QrError) -> Self {
        match err {
            QrError::Validation(_) => Self::BadRequest(err.to_string()),
            QrError::Generation(_) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "rejected request: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
