use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 64;
const PASSWORD_MIN_CHARS: usize = 8;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("Username is required")]
    EmptyUsername,

    #[error("Username must be at least 3 characters long")]
    UsernameTooShort,

    #[error("Username must be at most 64 characters long")]
    UsernameTooLong,

    #[error("Please provide a valid email address")]
    InvalidEmail,

    #[error("Password is required")]
    EmptyPassword,

    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }
}

//
// ─── VALIDATED FIELDS ──────────────────────────────────────────────────────────
//

/// Trimmed account name of 3 to 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// # Errors
    ///
    /// Returns `UserError` when the trimmed name is empty, too short or too long.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, UserError> {
        let trimmed = raw.as_ref().trim();
        let chars = trimmed.chars().count();
        if chars == 0 {
            return Err(UserError::EmptyUsername);
        }
        if chars < USERNAME_MIN_CHARS {
            return Err(UserError::UsernameTooShort);
        }
        if chars > USERNAME_MAX_CHARS {
            return Err(UserError::UsernameTooLong);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercased address used for password resets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// # Errors
    ///
    /// Returns `UserError::InvalidEmail` unless the value looks like `local@domain`.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, UserError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        let mut parts = normalized.split('@');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !normalized.chars().any(char::is_whitespace)
            }
            _ => false,
        };
        if !valid {
            return Err(UserError::InvalidEmail);
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks a candidate password before it is hashed.
///
/// # Errors
///
/// Returns `UserError::EmptyPassword` or `UserError::PasswordTooShort`.
pub fn validate_password(password: &str) -> Result<(), UserError> {
    if password.is_empty() {
        return Err(UserError::EmptyPassword);
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(UserError::PasswordTooShort);
    }
    Ok(())
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// Pending password reset: only the digest of the emailed token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl PasswordReset {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A stored account, including its credential material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: Option<Email>,
    pub role: Role,
    pub password_hash: String,
    pub reset: Option<PasswordReset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.as_str().to_owned(),
            email: self.email.as_ref().map(|e| e.as_str().to_owned()),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn username_is_trimmed_and_length_checked() {
        assert_eq!(Username::parse("  Admin ").unwrap().as_str(), "Admin");
        assert_eq!(Username::parse("   ").unwrap_err(), UserError::EmptyUsername);
        assert_eq!(Username::parse("ab").unwrap_err(), UserError::UsernameTooShort);
        assert_eq!(
            Username::parse("x".repeat(65)).unwrap_err(),
            UserError::UsernameTooLong
        );
    }

    #[test]
    fn email_is_normalized() {
        let email = Email::parse(" Someone@Example.ORG ").unwrap();
        assert_eq!(email.as_str(), "someone@example.org");
        assert!(Email::parse("no-at-sign").is_err());
        assert!(Email::parse("a@b@c.com").is_err());
        assert!(Email::parse("@example.com").is_err());
        assert!(Email::parse("a@localhost").is_err());
    }

    #[test]
    fn password_rules() {
        assert_eq!(validate_password(""), Err(UserError::EmptyPassword));
        assert_eq!(validate_password("short"), Err(UserError::PasswordTooShort));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn profile_hides_credentials() {
        let user = User {
            id: UserId::new(3),
            username: Username::parse("respondent").unwrap(),
            email: None,
            role: Role::User,
            password_hash: "$argon2id$secret".into(),
            reset: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        };
        let json = serde_json::to_value(user.profile()).unwrap();
        assert_eq!(json["username"], "respondent");
        assert_eq!(json["role"], "user");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("email").is_none());
    }

    #[test]
    fn reset_expiry_is_inclusive() {
        let reset = PasswordReset {
            token_hash: "abc".into(),
            expires_at: fixed_now(),
        };
        assert!(reset.is_expired(fixed_now()));
    }
}
