use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use taskboard_invites::InviteError;
use taskboard_types::api::ErrorBody;

/// Error returned by every handler, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    /// The cause is logged; callers only ever see a generic message.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!("Internal error: {}", cause);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        let status = match &err {
            InviteError::Validation(_) => StatusCode::BAD_REQUEST,
            InviteError::NotFound(_) => StatusCode::NOT_FOUND,
            InviteError::InvalidOrExpired => StatusCode::GONE,
            InviteError::AlreadyMember => StatusCode::CONFLICT,
            InviteError::AccessDenied => StatusCode::FORBIDDEN,
            InviteError::Storage(e) => return Self::internal(e),
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Run blocking DB or hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    })?
}
