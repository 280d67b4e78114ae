use std::sync::Arc;

use chrono::Duration;
use storage::repository::Storage;

use crate::Clock;
use crate::analytics_service::AnalyticsService;
use crate::auth_service::AuthService;
use crate::error::AppServicesError;
use crate::reset::{LogNotifier, ResetNotifier};
use crate::submission_service::SubmissionService;
use crate::token::TokenKeys;
use crate::user_service::UserService;

/// Inputs for token signing and reset links.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub reset_url_base: String,
}

/// Assembles every service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    users: Arc<UserService>,
    submissions: Arc<SubmissionService>,
    analytics: Arc<AnalyticsService>,
}

impl AppServices {
    /// Build services over `storage`, delivering reset links with `LogNotifier`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Token` when the JWT secret is too weak.
    pub fn new(
        storage: &Storage,
        clock: Clock,
        settings: &AuthSettings,
    ) -> Result<Self, AppServicesError> {
        let notifier: Arc<dyn ResetNotifier> =
            Arc::new(LogNotifier::new(settings.reset_url_base.clone()));
        Self::with_notifier(storage, clock, settings, notifier)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Token` when the JWT secret is too weak.
    pub fn with_notifier(
        storage: &Storage,
        clock: Clock,
        settings: &AuthSettings,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Result<Self, AppServicesError> {
        let keys = Arc::new(TokenKeys::new(
            settings.jwt_secret.as_bytes(),
            settings.token_ttl,
        )?);

        Ok(Self {
            auth: Arc::new(AuthService::new(
                clock,
                Arc::clone(&storage.users),
                keys,
                notifier,
            )),
            users: Arc::new(UserService::new(clock, Arc::clone(&storage.users))),
            submissions: Arc::new(SubmissionService::new(
                clock,
                Arc::clone(&storage.submissions),
            )),
            analytics: Arc::new(AnalyticsService::new(
                clock,
                Arc::clone(&storage.submissions),
            )),
        })
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// JWT secret is too weak.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: &AuthSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::new(&storage, clock, settings)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn submissions(&self) -> Arc<SubmissionService> {
        Arc::clone(&self.submissions)
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics)
    }
}
