//! Delivery of password reset links.

use async_trait::async_trait;
use tracing::info;

use survey_core::model::User;

use crate::error::NotifyError;

/// Hands a freshly generated reset token to the account owner.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `NotifyError` when the link cannot be delivered.
    async fn send_reset(&self, user: &User, token: &str) -> Result<(), NotifyError>;
}

/// Writes the reset link to the log. Used until mail delivery is configured.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    reset_url_base: String,
}

impl LogNotifier {
    #[must_use]
    pub fn new(reset_url_base: impl Into<String>) -> Self {
        Self {
            reset_url_base: reset_url_base.into(),
        }
    }

    #[must_use]
    pub fn reset_url(&self, token: &str) -> String {
        format!("{}/{token}", self.reset_url_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(&self, user: &User, token: &str) -> Result<(), NotifyError> {
        info!(
            user_id = %user.id,
            username = %user.username,
            reset_url = %self.reset_url(token),
            "password reset requested"
        );
        Ok(())
    }
}
