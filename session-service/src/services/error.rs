use service_core::error::AppError;
use thiserror::Error;

pub const SESSION_NOT_FOUND: &str = "Session could not be found";
pub const UPDATE_TARGET_NOT_FOUND: &str = "The session you are trying to update does not exist";
pub const DELETE_TARGET_NOT_FOUND: &str =
    "The session you are trying to delete could not be found (or has been deleted)";
pub const STALE_VERSION_TOKEN: &str =
    "Ensure that the session has the correct version token (ETag) and try again";
pub const NAME_EXISTS: &str =
    "A session with the same name already exists. Please choose a different name.";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] validator::ValidationErrors),

    #[error("Session not found")]
    NotFound,

    #[error("Version token does not match the current revision")]
    PreconditionFailed,

    #[error("Session name already exists")]
    DuplicateName,

    #[error("Store error: {0}")]
    Store(anyhow::Error),
}

impl SessionError {
    pub fn store(context: &str, err: impl std::fmt::Display) -> Self {
        SessionError::Store(anyhow::anyhow!("{}: {}", context, err))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::ValidationFailed(_) => "validation_failed",
            SessionError::NotFound => "not_found",
            SessionError::PreconditionFailed => "precondition_failed",
            SessionError::DuplicateName => "duplicate_name",
            SessionError::Store(_) => "store_error",
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ValidationFailed(e) => AppError::ValidationError(e),
            SessionError::NotFound => AppError::NotFound(anyhow::anyhow!(SESSION_NOT_FOUND)),
            SessionError::PreconditionFailed => {
                AppError::PreconditionFailed(anyhow::anyhow!(STALE_VERSION_TOKEN))
            }
            SessionError::DuplicateName => AppError::BadRequest(anyhow::anyhow!(NAME_EXISTS)),
            SessionError::Store(e) => AppError::DatabaseError(e),
        }
    }
}
