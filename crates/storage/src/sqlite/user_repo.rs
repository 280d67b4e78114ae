use chrono::{DateTime, Utc};
use survey_core::model::{Email, User, UserId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_user_row, read_err, user_id_from_i64, write_err};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

const USER_COLUMNS: &str = "id, username, email, role, password_hash, reset_token_hash, \
     reset_expires_at, created_at, updated_at";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, record: NewUserRecord) -> Result<User, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (username, email, role, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ",
        )
        .bind(record.username.as_str())
        .bind(record.email.as_ref().map(Email::as_str))
        .bind(record.role.as_str())
        .bind(&record.password_hash)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(User {
            id: user_id_from_i64(res.last_insert_rowid())?,
            username: record.username,
            email: record.email,
            role: record.role,
            password_hash: record.password_hash,
            reset: None,
            created_at: record.created_at,
            updated_at: record.created_at,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id_to_i64(id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token_hash = ?1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        // Expiry is compared on the decoded timestamp rather than the stored text.
        let user = row.as_ref().map(map_user_row).transpose()?;
        Ok(user.filter(|u| u.reset.as_ref().is_some_and(|r| !r.is_expired(now))))
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;
        rows.iter().map(map_user_row).collect()
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE users SET
                username = ?2,
                email = ?3,
                role = ?4,
                password_hash = ?5,
                reset_token_hash = ?6,
                reset_expires_at = ?7,
                updated_at = ?8
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64(user.id.value())?)
        .bind(user.username.as_str())
        .bind(user.email.as_ref().map(Email::as_str))
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.reset.as_ref().map(|r| r.token_hash.as_str()))
        .bind(user.reset.as_ref().map(|r| r.expires_at))
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id_to_i64(id.value())?)
            .execute(&self.pool)
            .await
            .map_err(read_err)?;
        Ok(res.rows_affected() > 0)
    }
}
