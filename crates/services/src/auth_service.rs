use std::sync::Arc;

use chrono::Duration;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use storage::repository::{NewUserRecord, StorageError, UserRepository};
use survey_core::model::{Email, PasswordReset, Role, User, UserError, Username, validate_password};

use crate::Clock;
use crate::error::{AuthError, ValidationErrors};
use crate::password::{hash_password, verify_decoy, verify_password};
use crate::reset::ResetNotifier;
use crate::token::TokenKeys;

/// Lifetime of a password reset token.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// A signed-in user together with their bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Registration, login, token checks and password resets.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    keys: Arc<TokenKeys>,
    notifier: Arc<dyn ResetNotifier>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        keys: Arc<TokenKeys>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        Self {
            clock,
            users,
            keys,
            notifier,
        }
    }

    #[must_use]
    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Create a regular account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` with every failed field check,
    /// `AuthError::UsernameTaken` / `AuthError::EmailTaken` for duplicates,
    /// and `AuthError::Storage` if persistence fails.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<Session, AuthError> {
        let mut errors = Vec::new();
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

        if self.users.find_by_username(username.as_str()).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if let Some(email) = &email {
            if self.users.find_by_email(email).await?.is_some() {
                return Err(AuthError::EmailTaken);
            }
        }

        let record = NewUserRecord {
            username,
            email,
            role: Role::User,
            password_hash: hash_password(password).await?,
            created_at: self.clock.now(),
        };
        let user = self.users.insert_user(record).await.map_err(|e| match e {
            StorageError::Conflict => AuthError::UsernameTaken,
            other => AuthError::Storage(other),
        })?;
        info!(user_id = %user.id, username = %user.username, "user registered");

        self.session_for(user)
    }

    /// Check credentials and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` when a field is missing and
    /// `AuthError::InvalidCredentials` for an unknown user or wrong password.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let username = username.trim();
        let mut errors = Vec::new();
        if username.is_empty() {
            errors.push(UserError::EmptyUsername);
        }
        if password.is_empty() {
            errors.push(UserError::EmptyPassword);
        }
        ValidationErrors::check(errors)?;

        let user = self.users.find_by_username(username).await?;
        let verified = match &user {
            Some(user) => verify_password(password, &user.password_hash).await,
            None => verify_decoy(password).await,
        };
        match user {
            Some(user) if verified => {
                info!(user_id = %user.id, "login succeeded");
                self.session_for(user)
            }
            _ => {
                warn!(username, "login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Resolve a bearer token to the current user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for bad or expired tokens and
    /// `AuthError::UserGone` when the account was deleted after issue.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self
            .keys
            .verify(token, self.clock.now())
            .map_err(|_| AuthError::InvalidToken)?;
        let id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;
        self.users.get_user(id).await?.ok_or(AuthError::UserGone)
    }

    /// Start a password reset for the account owning `email`.
    ///
    /// Unknown addresses succeed silently.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for a malformed address, `AuthError::Notify`
    /// when the link cannot be delivered and `AuthError::Storage` on
    /// repository failures.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email).map_err(ValidationErrors::from)?;
        let Some(mut user) = self.users.find_by_email(&email).await? else {
            info!("password reset requested for unknown address");
            return Ok(());
        };

        let token = generate_reset_token();
        let now = self.clock.now();
        user.reset = Some(PasswordReset {
            token_hash: digest_token(&token),
            expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        });
        user.updated_at = now;
        self.users.update_user(&user).await?;

        if let Err(err) = self.notifier.send_reset(&user, &token).await {
            user.reset = None;
            self.users.update_user(&user).await?;
            return Err(err.into());
        }
        Ok(())
    }

    /// Set a new password using a reset token, then sign the user in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for a weak password and
    /// `AuthError::InvalidResetToken` when no unexpired reset matches.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<Session, AuthError> {
        validate_password(password).map_err(ValidationErrors::from)?;

        let now = self.clock.now();
        let mut user = self
            .users
            .find_by_reset_token(&digest_token(token.trim()), now)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        user.password_hash = hash_password(password).await?;
        user.reset = None;
        user.updated_at = now;
        self.users.update_user(&user).await?;
        info!(user_id = %user.id, "password reset completed");

        self.session_for(user)
    }

    fn session_for(&self, user: User) -> Result<Session, AuthError> {
        let token = self.keys.issue(&user, self.clock.now())?;
        Ok(Session { token, user })
    }
}

fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use storage::repository::InMemoryRepository;
    use survey_core::time::fixed_clock;

    use crate::error::NotifyError;

    const SECRET: &[u8] = b"an-hs256-secret-that-is-long-enough";

    #[derive(Default)]
    struct CapturingNotifier {
        tokens: Mutex<Vec<String>>,
    }

    impl CapturingNotifier {
        fn last(&self) -> Option<String> {
            self.tokens.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl ResetNotifier for CapturingNotifier {
        async fn send_reset(&self, _user: &User, token: &str) -> Result<(), NotifyError> {
            self.tokens.lock().unwrap().push(token.to_owned());
            Ok(())
        }
    }

    fn service_with(clock: Clock, repo: &InMemoryRepository) -> (AuthService, Arc<CapturingNotifier>) {
        let notifier = Arc::new(CapturingNotifier::default());
        let keys = Arc::new(TokenKeys::new(SECRET, Duration::hours(24)).unwrap());
        let service = AuthService::new(clock, Arc::new(repo.clone()), keys, notifier.clone());
        (service, notifier)
    }

    #[tokio::test]
    async fn register_then_login_and_authenticate() {
        let repo = InMemoryRepository::new();
        let (auth, _) = service_with(fixed_clock(), &repo);

        let session = auth
            .register("alice", "password123", Some("Alice@Example.com"))
            .await
            .unwrap();
        assert_eq!(session.user.role, Role::User);
        assert_eq!(
            session.user.email.as_ref().map(Email::as_str),
            Some("alice@example.com")
        );
        assert_ne!(session.user.password_hash, "password123");

        let login = auth.login(" alice ", "password123").await.unwrap();
        let current = auth.authenticate(&login.token).await.unwrap();
        assert_eq!(current.id, session.user.id);
    }

    #[tokio::test]
    async fn register_reports_all_validation_failures() {
        let repo = InMemoryRepository::new();
        let (auth, _) = service_with(fixed_clock(), &repo);

        let err = auth.register("al", "short", None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Username must be at least 3 characters long, Password must be at least 8 characters long"
        );
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let repo = InMemoryRepository::new();
        let (auth, _) = service_with(fixed_clock(), &repo);

        auth.register("alice", "password123", None).await.unwrap();
        assert!(matches!(
            auth.register("alice", "password456", None).await,
            Err(AuthError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let repo = InMemoryRepository::new();
        let (auth, _) = service_with(fixed_clock(), &repo);
        auth.register("alice", "password123", None).await.unwrap();

        let wrong = auth.login("alice", "password999").await.unwrap_err();
        let unknown = auth.login("mallory", "password123").await.unwrap_err();
        assert_eq!(wrong.to_string(), "Incorrect username or password");
        assert_eq!(unknown.to_string(), wrong.to_string());

        let missing = auth.login("", "").await.unwrap_err();
        assert_eq!(missing.to_string(), "Username is required, Password is required");
    }

    #[tokio::test]
    async fn tokens_for_deleted_users_are_rejected() {
        let repo = InMemoryRepository::new();
        let (auth, _) = service_with(fixed_clock(), &repo);
        let session = auth.register("alice", "password123", None).await.unwrap();

        assert!(matches!(
            auth.authenticate("garbage").await,
            Err(AuthError::InvalidToken)
        ));
        repo.delete_user(session.user.id).await.unwrap();
        assert!(matches!(
            auth.authenticate(&session.token).await,
            Err(AuthError::UserGone)
        ));
    }

    #[tokio::test]
    async fn reset_flow_changes_password_once() {
        let repo = InMemoryRepository::new();
        let (auth, notifier) = service_with(fixed_clock(), &repo);
        auth.register("alice", "password123", Some("alice@example.com"))
            .await
            .unwrap();

        auth.forgot_password("nobody@example.com").await.unwrap();
        assert!(notifier.last().is_none());

        auth.forgot_password("alice@example.com").await.unwrap();
        let token = notifier.last().expect("token delivered");
        assert_eq!(token.len(), 64);

        let stored = repo.find_by_username("alice").await.unwrap().unwrap();
        let reset = stored.reset.expect("reset pending");
        assert_ne!(reset.token_hash, token);

        auth.reset_password(&token, "new-password-1").await.unwrap();
        auth.login("alice", "new-password-1").await.unwrap();
        assert!(matches!(
            auth.reset_password(&token, "another-pass-2").await,
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[tokio::test]
    async fn expired_reset_tokens_are_rejected() {
        let repo = InMemoryRepository::new();
        let (auth, notifier) = service_with(fixed_clock(), &repo);
        auth.register("alice", "password123", Some("alice@example.com"))
            .await
            .unwrap();
        auth.forgot_password("alice@example.com").await.unwrap();
        let token = notifier.last().unwrap();

        let mut later = fixed_clock();
        later.advance(Duration::minutes(RESET_TOKEN_TTL_MINUTES + 1));
        let notifier: Arc<dyn ResetNotifier> = notifier;
        let late = AuthService::new(later, Arc::new(repo.clone()), auth.keys.clone(), notifier);
        assert!(matches!(
            late.reset_password(&token, "new-password-1").await,
            Err(AuthError::InvalidResetToken)
        ));
    }
}
