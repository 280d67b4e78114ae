use axum::{
    Json,
    extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use services::{
    AnalyticsError, AuthError, SubmissionServiceError, UnknownExportFormat, UserServiceError,
};

pub const LOGIN_REQUIRED: &str = "Please log in to access this resource";
pub const FORBIDDEN: &str = "You do not have permission to perform this action";
pub const TOO_MANY_REQUESTS: &str = "Too many requests, please try again later";
pub const ROUTE_NOT_FOUND: &str = "Route not found";
pub const PAYLOAD_TOO_LARGE: &str = "Request body is too large";

/// Every failure a handler can return, rendered as `{"status":"error","message":...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Request body is too large")]
    PayloadTooLarge,

    #[error("Too many requests, please try again later")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                "Something went wrong".to_owned()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Invalid(_)
            | AuthError::UsernameTaken
            | AuthError::EmailTaken
            | AuthError::InvalidResetToken => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::UserGone => {
                ApiError::Unauthorized(err.to_string())
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Invalid(_) | UserServiceError::Conflict => {
                ApiError::BadRequest(err.to_string())
            }
            UserServiceError::NotFound => ApiError::NotFound(err.to_string()),
            other => ApiError::internal(other),
        }
    }
}

impl From<SubmissionServiceError> for ApiError {
    fn from(err: SubmissionServiceError) -> Self {
        match err {
            SubmissionServiceError::Submission(_) => ApiError::BadRequest(err.to_string()),
            SubmissionServiceError::NotFound => ApiError::NotFound(err.to_string()),
            other => ApiError::internal(other),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        ApiError::internal(err)
    }
}

impl From<UnknownExportFormat> for ApiError {
    fn from(err: UnknownExportFormat) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
