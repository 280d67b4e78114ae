use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use storage::repository::{NewSubmissionRecord, SubmissionOrder, SubmissionRepository};
use survey_core::model::{Submission, SubmissionDraft, SubmissionId, SubmissionRow};

use crate::Clock;
use crate::error::SubmissionServiceError;
use crate::export::{self, Export, ExportFormat};

/// Accepts questionnaire submissions and serves them back to admins.
#[derive(Clone)]
pub struct SubmissionService {
    clock: Clock,
    submissions: Arc<dyn SubmissionRepository>,
}

impl SubmissionService {
    #[must_use]
    pub fn new(clock: Clock, submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self { clock, submissions }
    }

    /// Validate and store a raw JSON body.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionServiceError::Submission` for an empty or malformed body.
    /// Returns `SubmissionServiceError::Storage` if persistence fails.
    pub async fn submit(&self, body: Value) -> Result<Submission, SubmissionServiceError> {
        let draft = SubmissionDraft::from_json(body)?;
        let record = NewSubmissionRecord::from_draft(draft, self.clock.now());
        let submission = self.submissions.insert_submission(record).await?;
        info!(
            submission_id = %submission.id,
            sections = submission.section_count(),
            "questionnaire submitted"
        );
        Ok(submission)
    }

    /// # Errors
    ///
    /// Returns `SubmissionServiceError::NotFound` when no submission has this id.
    pub async fn get(&self, id: SubmissionId) -> Result<Submission, SubmissionServiceError> {
        self.submissions
            .get_submission(id)
            .await?
            .ok_or(SubmissionServiceError::NotFound)
    }

    /// Newest first, keeping those whose flattened row matches `filter`.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionServiceError::Storage` if repository access fails.
    pub async fn list(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<Submission>, SubmissionServiceError> {
        let all = self.submissions.list_submissions(SubmissionOrder::Newest).await?;
        Ok(match active_filter(filter) {
            Some(filter) => all
                .into_iter()
                .filter(|s| SubmissionRow::from_submission(s).matches(filter))
                .collect(),
            None => all,
        })
    }

    /// Flattened rows, newest first, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionServiceError::Storage` if repository access fails.
    pub async fn rows(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<SubmissionRow>, SubmissionServiceError> {
        let all = self.submissions.list_submissions(SubmissionOrder::Newest).await?;
        let rows = all.iter().map(SubmissionRow::from_submission);
        Ok(match active_filter(filter) {
            Some(filter) => rows.filter(|row| row.matches(filter)).collect(),
            None => rows.collect(),
        })
    }

    /// # Errors
    ///
    /// Returns `SubmissionServiceError::Export` if rendering fails and
    /// `SubmissionServiceError::Storage` if repository access fails.
    pub async fn export(
        &self,
        format: ExportFormat,
        filter: Option<&str>,
    ) -> Result<Export, SubmissionServiceError> {
        let rows = self.rows(filter).await?;
        export::render(format, &rows, self.clock.now())
    }
}

fn active_filter(filter: Option<&str>) -> Option<&str> {
    filter.map(str::trim).filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use serde_json::json;
    use storage::repository::InMemoryRepository;
    use survey_core::model::SubmissionError;
    use survey_core::time::fixed_clock;

    #[tokio::test]
    async fn empty_bodies_are_rejected() {
        let service = SubmissionService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let err = service.submit(json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionServiceError::Submission(SubmissionError::Empty)
        ));
        assert_eq!(err.to_string(), "No data provided in the request");
    }

    #[tokio::test]
    async fn lists_newest_first_and_filters_rows() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut clock = fixed_clock();
        let first = SubmissionService::new(clock, repo.clone())
            .submit(json!({ "demographics": { "occupation": "Urban Planner" } }))
            .await
            .unwrap();
        clock.advance(Duration::hours(2));
        let service = SubmissionService::new(clock, repo);
        let second = service
            .submit(json!({ "demographics": { "occupation": "Software Developer" } }))
            .await
            .unwrap();

        let ids: Vec<_> = service.list(None).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, [second.id, first.id]);

        let planners = service.list(Some("  PLANNER ")).await.unwrap();
        assert_eq!(planners.len(), 1);
        assert_eq!(planners[0].id, first.id);

        let rows = service.rows(Some("developer")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].occupation, "Software Developer");
        assert_eq!(rows[0].participated_projects, "No");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let service = SubmissionService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        assert!(matches!(
            service.get(SubmissionId::new(42)).await,
            Err(SubmissionServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn export_uses_filtered_rows() {
        let service = SubmissionService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        service
            .submit(json!({ "demographics": { "occupation": "Policy Analyst" } }))
            .await
            .unwrap();
        service
            .submit(json!({ "demographics": { "occupation": "Engineer" } }))
            .await
            .unwrap();

        let export = service
            .export(ExportFormat::Json, Some("analyst"))
            .await
            .unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_slice(&export.body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["occupation"], "Policy Analyst");
    }
}
