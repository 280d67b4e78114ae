use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use survey_core::model::{
    Email, PasswordReset, Responses, Role, Submission, SubmissionId, User, UserId, Username,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps write failures, turning unique-constraint violations into `Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization("id overflow".into()))
}

pub(crate) fn submission_id_from_i64(v: i64) -> Result<SubmissionId, StorageError> {
    Ok(SubmissionId::new(i64_to_u64("submission_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn responses_to_text(responses: &Responses) -> Result<String, StorageError> {
    serde_json::to_string(responses).map_err(ser)
}

pub(crate) fn map_submission_row(row: &SqliteRow) -> Result<Submission, StorageError> {
    let raw: String = row.try_get("responses").map_err(ser)?;
    let responses: Responses = serde_json::from_str(&raw).map_err(ser)?;

    Ok(Submission {
        id: submission_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        responses,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
    })
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let username = Username::parse(row.try_get::<String, _>("username").map_err(ser)?)
        .map_err(ser)?;
    let email = row
        .try_get::<Option<String>, _>("email")
        .map_err(ser)?
        .map(Email::parse)
        .transpose()
        .map_err(ser)?;
    let role: Role = row
        .try_get::<String, _>("role")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    let token_hash: Option<String> = row.try_get("reset_token_hash").map_err(ser)?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("reset_expires_at").map_err(ser)?;
    let reset = match (token_hash, expires_at) {
        (Some(token_hash), Some(expires_at)) => Some(PasswordReset {
            token_hash,
            expires_at,
        }),
        (None, None) => None,
        _ => {
            return Err(StorageError::Serialization(
                "reset token and expiry must be set together".into(),
            ));
        }
    };

    Ok(User {
        id: user_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        username,
        email,
        role,
        password_hash: row.try_get("password_hash").map_err(ser)?,
        reset,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
