use std::sync::Arc;

use tracing::debug;

use storage::repository::{SubmissionOrder, SubmissionRepository};
use survey_core::analytics::{AnalyticsReport, build_report};

use crate::Clock;
use crate::error::AnalyticsError;

/// Builds the dashboard report from every stored submission.
#[derive(Clone)]
pub struct AnalyticsService {
    clock: Clock,
    submissions: Arc<dyn SubmissionRepository>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(clock: Clock, submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self { clock, submissions }
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn report(&self) -> Result<AnalyticsReport, AnalyticsError> {
        let submissions = self
            .submissions
            .list_submissions(SubmissionOrder::Oldest)
            .await?;
        debug!(count = submissions.len(), "building analytics report");
        Ok(build_report(&submissions, self.clock.now()))
    }
}
