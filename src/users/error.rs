use axum::http::StatusCode;
use thiserror::Error;

/// Domain errors for the user module. `Internal` carries only the message
/// text of the underlying failure; the original kind is not preserved.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::Validation(_) => StatusCode::BAD_REQUEST,
            UserError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::Conflict(_) => StatusCode::CONFLICT,
            UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        UserError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(e: anyhow::Error) -> Self {
        UserError::Internal(e.to_string())
    }
}

impl From<UserError> for (StatusCode, String) {
    fn from(e: UserError) -> Self {
        (e.status(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(
            UserError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UserError::NotFound("missing".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            UserError::Conflict("taken".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            UserError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_keeps_only_the_message() {
        let source = anyhow::anyhow!("connection reset");
        let err: UserError = source.into();
        let (status, message): (StatusCode, String) = err.into();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "connection reset");
    }
}
