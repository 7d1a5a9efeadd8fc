use thiserror::Error;

/// Outcome taxonomy for every invite and membership operation. Storage
/// failures are wrapped; no raw database error escapes as anything else.
#[derive(Debug, Error)]
pub enum InviteError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Deliberately generic: wrong token, expired, used, and cancelled all
    /// look the same.
    #[error("invalid or expired invite")]
    InvalidOrExpired,

    #[error("already a member of this board")]
    AlreadyMember,

    #[error("access denied")]
    AccessDenied,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl InviteError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
