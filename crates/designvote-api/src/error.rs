use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use designvote_auth::AuthError;
use designvote_db::StoreError;
use designvote_types::api::ErrorBody;

use crate::blob::BlobError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Storage failure: {0}")]
    Storage(StoreError),

    #[error("Upstream failure: {0}")]
    Upstream(#[from] BlobError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::Storage(_) => "storage_failure",
            AppError::Upstream(_) => "upstream_failure",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(what) => AppError::Conflict(what),
            StoreError::Invalid(msg) => AppError::BadRequest(msg),
            other => AppError::Storage(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(_) | AuthError::InvalidCredentials => AppError::Unauthorized,
            AuthError::DuplicateUsername => AppError::Conflict("username"),
            AuthError::Hash(msg) => AppError::Internal(msg),
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("spawn_blocking join error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::NotFound(_) => "Not found".to_string(),
            AppError::Conflict(_) => "Already exists".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::PayloadTooLarge => "Payload too large".to_string(),
            AppError::Storage(e) => {
                error!("Storage error: {}", e);
                "Backend error, storage failure".to_string()
            }
            AppError::Upstream(e) => {
                error!("Blob store error: {}", e);
                "Backend error, failed to store upload".to_string()
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                "Backend error".to_string()
            }
        };

        let body = ErrorBody {
            error: message,
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
