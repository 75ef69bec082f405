//! Unified error handling for the API surface.
//!
//! Validation and authorization failures are client-facing and map to 4xx
//! responses with a short message. Infrastructure faults map to a generic
//! 500; full detail goes to the server log, never to the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use courier_auth::password::HashError;
use courier_auth::token::TokenError;
use courier_db::StoreError;
use courier_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Registration with a username that already exists.
    #[error("username is already taken")]
    DuplicateUser,

    /// Login failure. Unknown username and wrong password share this
    /// variant so callers cannot probe which usernames exist.
    #[error("invalid username/password")]
    InvalidCredentials,

    /// Sending to a username that does not exist.
    #[error("unknown recipient")]
    UnknownRecipient,

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    /// Missing, malformed, tampered, or expired bearer token.
    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    BadRequest(String),

    /// Storage-layer fault. Fatal to the request.
    #[error("storage unavailable")]
    Store(#[source] StoreError),

    /// Hashing/signing library fault or task failure. Fatal to the request.
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => Self::InvalidToken,
            TokenError::Signing(e) => Self::Internal(format!("token signing failed: {e}")),
        }
    }
}

impl From<HashError> for ApiError {
    fn from(err: HashError) -> Self {
        Self::Internal(format!("password hashing failed: {err}"))
    }
}

/// Maps a `spawn_blocking` join failure into a request-fatal error.
pub(crate) fn join_error(err: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(format!("blocking task failed: {err}"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Store(_) | Self::Internal(_)) {
            tracing::error!(error = ?self, "request failed");
        }

        let status = match &self {
            Self::DuplicateUser => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::UnknownRecipient | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Never leak internal detail to the client.
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(ApiError::DuplicateUser.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::InvalidCredentials.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::UnknownRecipient.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn infrastructure_errors_hide_detail() {
        let response = ApiError::Internal("secret detail".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
