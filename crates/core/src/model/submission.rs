use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ids::SubmissionId;

/// Free-form answers keyed by questionnaire section.
pub type Responses = Map<String, Value>;

const STARTED_AT_KEY: &str = "startedAt";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("No data provided in the request")]
    Empty,

    #[error("startedAt must be an RFC 3339 timestamp")]
    InvalidStartedAt,
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// A validated, not yet persisted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDraft {
    pub responses: Responses,
    pub started_at: Option<DateTime<Utc>>,
}

impl SubmissionDraft {
    /// Validate a raw request body.
    ///
    /// The body must be a non-empty JSON object. An optional top-level
    /// `startedAt` timestamp is lifted out of the answers.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Empty` when there is nothing to store and
    /// `SubmissionError::InvalidStartedAt` for a malformed start time.
    pub fn from_json(value: Value) -> Result<Self, SubmissionError> {
        let Value::Object(mut responses) = value else {
            return Err(SubmissionError::Empty);
        };

        let started_at = match responses.remove(STARTED_AT_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|_| SubmissionError::InvalidStartedAt)?
                    .with_timezone(&Utc),
            ),
            Some(_) => return Err(SubmissionError::InvalidStartedAt),
        };

        if responses.is_empty() {
            return Err(SubmissionError::Empty);
        }

        Ok(Self {
            responses,
            started_at,
        })
    }

    #[must_use]
    pub fn assign_id(self, id: SubmissionId, submitted_at: DateTime<Utc>) -> Submission {
        Submission {
            id,
            responses: self.responses,
            submitted_at,
            started_at: self.started_at,
        }
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// One respondent's stored answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub responses: Responses,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Number of top-level sections present in the answers.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.responses.len()
    }

    /// Names of the sections present, in stored order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.responses.keys().map(String::as_str)
    }

    /// Time spent between opening the form and submitting it, when known.
    #[must_use]
    pub fn completion_time(&self) -> Option<Duration> {
        let started = self.started_at?;
        let elapsed = self.submitted_at - started;
        (elapsed >= Duration::zero()).then_some(elapsed)
    }

    /// Looks up `responses[section][field]`.
    #[must_use]
    pub fn answer(&self, section: &str, field: &str) -> Option<&Value> {
        self.responses.get(section)?.as_object()?.get(field)
    }

    /// Looks up a top-level answer for submissions sent without sections.
    #[must_use]
    pub fn top_level(&self, field: &str) -> Option<&Value> {
        self.responses.get(field)
    }
}
