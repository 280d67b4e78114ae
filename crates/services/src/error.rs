//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use survey_core::model::{SubmissionError, UserError};

/// One or more field validation failures, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<UserError>);

impl ValidationErrors {
    /// Returns `Err` when any failures were collected.
    ///
    /// # Errors
    ///
    /// Returns the collected failures.
    pub fn check(errors: Vec<UserError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }

    #[must_use]
    pub fn errors(&self) -> &[UserError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<UserError> for ValidationErrors {
    fn from(err: UserError) -> Self {
        Self(vec![err])
    }
}

/// Errors emitted by password hashing.
#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordHashError(pub String);

/// Errors emitted while issuing or checking session tokens.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    #[error("JWT secret must be at least {min} bytes")]
    WeakSecret { min: usize },
    #[error("token expired")]
    Expired,
    #[error("token lifetime is out of range")]
    TtlOutOfRange,
    #[error("malformed subject claim")]
    BadSubject,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Errors emitted by `ResetNotifier` implementations.
#[derive(Debug, Error)]
#[error("could not deliver reset link: {0}")]
pub struct NotifyError(pub String);

/// Errors emitted by `SubmissionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionServiceError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("No submission found with that ID")]
    NotFound,
    #[error("export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnalyticsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyticsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already exists")]
    EmailTaken,
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("Invalid token. Please log in again")]
    InvalidToken,
    #[error("User no longer exists")]
    UserGone,
    #[error("Invalid or expired token")]
    InvalidResetToken,
    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    #[error("No user found with that ID")]
    NotFound,
    #[error("Username or email already exists")]
    Conflict,
    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for UserServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::Conflict => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_joined() {
        let err = ValidationErrors::check(vec![
            UserError::UsernameTooShort,
            UserError::PasswordTooShort,
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Username must be at least 3 characters long, Password must be at least 8 characters long"
        );
        assert!(ValidationErrors::check(Vec::new()).is_ok());
    }

    #[test]
    fn storage_conflicts_become_user_conflicts() {
        assert!(matches!(
            UserServiceError::from(StorageError::Conflict),
            UserServiceError::Conflict
        ));
        assert!(matches!(
            UserServiceError::from(StorageError::Connection("down".into())),
            UserServiceError::Storage(_)
        ));
    }
}
