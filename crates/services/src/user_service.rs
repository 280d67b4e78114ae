use std::sync::Arc;

use tracing::info;

use storage::repository::{NewUserRecord, UserRepository};
use survey_core::model::{Email, Role, User, UserError, UserId, Username, validate_password};

use crate::Clock;
use crate::error::{UserServiceError, ValidationErrors};
use crate::password::hash_password;

/// Fields an administrator may change on an account. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    /// `Some("")` clears the address.
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Account lookups and administration.
#[derive(Clone)]
pub struct UserService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::NotFound` when no account has this id.
    pub async fn profile(&self, id: UserId) -> Result<User, UserServiceError> {
        self.get_user(id).await
    }

    /// Let a signed-in user rename themselves. Other fields are not editable here.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Invalid` for a bad name and
    /// `UserServiceError::Conflict` when the name is taken.
    pub async fn update_me(
        &self,
        id: UserId,
        username: Option<&str>,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_user(id).await?;
        if let Some(raw) = username {
            user.username = Username::parse(raw).map_err(ValidationErrors::from)?;
            user.updated_at = self.clock.now();
            self.users.update_user(&user).await?;
        }
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` if repository access fails.
    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.users.list_users().await?)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::NotFound` when no account has this id.
    pub async fn get_user(&self, id: UserId) -> Result<User, UserServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Apply an administrator's changes to an account.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Invalid` with every failed field check,
    /// `UserServiceError::NotFound` for an unknown id and
    /// `UserServiceError::Conflict` when the name or address is taken.
    pub async fn update_user(
        &self,
        id: UserId,
        patch: UserPatch,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_user(id).await?;
        let mut errors = Vec::new();

        if let Some(raw) = patch.username.as_deref() {
            match Username::parse(raw) {
                Ok(name) => user.username = name,
                Err(e) => errors.push(e),
            }
        }
        if let Some(raw) = patch.email.as_deref() {
            if raw.trim().is_empty() {
                user.email = None;
            } else {
                match Email::parse(raw) {
                    Ok(email) => user.email = Some(email),
                    Err(e) => errors.push(e),
                }
            }
        }
        ValidationErrors::check(errors)?;
        if let Some(role) = patch.role {
            user.role = role;
        }

        user.updated_at = self.clock.now();
        self.users.update_user(&user).await?;
        info!(user_id = %user.id, role = %user.role, "user updated by admin");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::NotFound` when nothing was deleted.
    pub async fn delete_user(&self, id: UserId) -> Result<(), UserServiceError> {
        if self.users.delete_user(id).await? {
            info!(user_id = %id, "user deleted");
            Ok(())
        } else {
            Err(UserServiceError::NotFound)
        }
    }

    /// Create an account with an explicit role.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Invalid` for bad input and
    /// `UserServiceError::Conflict` for duplicates.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        role: Role,
    ) -> Result<User, UserServiceError> {
        let mut errors: Vec<UserError> = Vec::new();
        let username = Username::parse(username)
            .inspect_err(|e| errors.push(e.clone()))
            .ok();
        if let Err(e) = validate_password(password) {
            errors.push(e);
        }
        let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(raw) => Email::parse(raw).inspect_err(|e| errors.push(e.clone())).ok(),
            None => None,
        };
        ValidationErrors::check(errors)?;
        let Some(username) = username else {
            return Err(ValidationErrors::from(UserError::EmptyUsername).into());
        };

        let user = self
            .users
            .insert_user(NewUserRecord {
                username,
                email,
                role,
                password_hash: hash_password(password).await?,
                created_at: self.clock.now(),
            })
            .await?;
        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Make sure an administrator named `username` exists with `password`.
    ///
    /// An existing account is promoted and gets the new password. Returns the
    /// user and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Invalid` for bad input.
    pub async fn ensure_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, bool), UserServiceError> {
        let name = Username::parse(username).map_err(ValidationErrors::from)?;
        validate_password(password).map_err(ValidationErrors::from)?;

        match self.users.find_by_username(name.as_str()).await? {
            Some(mut user) => {
                user.role = Role::Admin;
                user.password_hash = hash_password(password).await?;
                user.reset = None;
                user.updated_at = self.clock.now();
                self.users.update_user(&user).await?;
                info!(user_id = %user.id, "existing user promoted to admin");
                Ok((user, false))
            }
            None => {
                let user = self
                    .create_user(name.as_str(), password, None, Role::Admin)
                    .await?;
                Ok((user, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use survey_core::time::fixed_clock;

    use crate::password::verify_password;

    fn service() -> UserService {
        UserService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn update_me_only_renames() {
        let users = service();
        let user = users
            .create_user("alice", "password123", None, Role::User)
            .await
            .unwrap();

        let renamed = users.update_me(user.id, Some("alicia")).await.unwrap();
        assert_eq!(renamed.username.as_str(), "alicia");
        assert_eq!(renamed.role, Role::User);

        let unchanged = users.update_me(user.id, None).await.unwrap();
        assert_eq!(unchanged.username.as_str(), "alicia");

        let err = users.update_me(user.id, Some("al")).await.unwrap_err();
        assert_eq!(err.to_string(), "Username must be at least 3 characters long");
    }

    #[tokio::test]
    async fn admin_patch_changes_role_and_email() {
        let users = service();
        let user = users
            .create_user("bob", "password123", Some("bob@example.com"), Role::User)
            .await
            .unwrap();

        let updated = users
            .update_user(
                user.id,
                UserPatch {
                    role: Some(Role::Admin),
                    email: Some(String::new()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(updated.email.is_none());

        let err = users
            .update_user(
                user.id,
                UserPatch {
                    username: Some("x".into()),
                    email: Some("nope".into()),
                    role: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::Invalid(ref v) if v.errors().len() == 2));
    }

    #[tokio::test]
    async fn renaming_onto_an_existing_name_conflicts() {
        let users = service();
        users
            .create_user("carol", "password123", None, Role::User)
            .await
            .unwrap();
        let dave = users
            .create_user("dave", "password123", None, Role::User)
            .await
            .unwrap();

        assert!(matches!(
            users.update_me(dave.id, Some("carol")).await,
            Err(UserServiceError::Conflict)
        ));
    }

    #[tokio::test]
    async fn missing_users_are_not_found() {
        let users = service();
        let missing = UserId::new(99);
        assert!(matches!(
            users.get_user(missing).await,
            Err(UserServiceError::NotFound)
        ));
        assert!(matches!(
            users.delete_user(missing).await,
            Err(UserServiceError::NotFound)
        ));
        assert!(matches!(
            users.update_user(missing, UserPatch::default()).await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn ensure_admin_creates_then_promotes() {
        let users = service();
        let (created, fresh) = users.ensure_admin("root", "password123").await.unwrap();
        assert!(fresh);
        assert_eq!(created.role, Role::Admin);

        let plain = users
            .create_user("erin", "password123", None, Role::User)
            .await
            .unwrap();
        let (promoted, fresh) = users.ensure_admin("erin", "rotated-pass-9").await.unwrap();
        assert!(!fresh);
        assert_eq!(promoted.id, plain.id);
        assert_eq!(promoted.role, Role::Admin);
        assert!(verify_password("rotated-pass-9", &promoted.password_hash).await);
    }
}
