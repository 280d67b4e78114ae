use serde::Serialize;
use serde_json::Value;

use crate::model::submission::Submission;
use crate::time::day_stamp;

const NOT_SPECIFIED: &str = "Not specified";

/// Flattened view of a submission used by the admin listing and exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRow {
    pub id: String,
    pub date: String,
    pub occupation: String,
    pub education_level: String,
    pub years_of_experience: String,
    pub blockchain_familiarity: String,
    pub participated_projects: String,
    pub adoption_likelihood: String,
    pub stakeholder_views: String,
}

impl SubmissionRow {
    /// Column order for tabular exports; matches the serialized field names.
    pub const HEADERS: [&'static str; 9] = [
        "id",
        "date",
        "occupation",
        "educationLevel",
        "yearsOfExperience",
        "blockchainFamiliarity",
        "participatedProjects",
        "adoptionLikelihood",
        "stakeholderViews",
    ];

    #[must_use]
    pub fn from_submission(submission: &Submission) -> Self {
        let pick = |section: &str, field: &str, fallback: &str| {
            submission
                .answer(section, field)
                .and_then(display_value)
                .or_else(|| submission.top_level(field).and_then(display_value))
                .unwrap_or_else(|| fallback.to_owned())
        };

        Self {
            id: submission.id.to_string(),
            date: day_stamp(submission.submitted_at),
            occupation: pick("demographics", "occupation", NOT_SPECIFIED),
            education_level: pick("demographics", "educationLevel", NOT_SPECIFIED),
            years_of_experience: pick("demographics", "yearsOfExperience", NOT_SPECIFIED),
            blockchain_familiarity: pick("knowledge", "blockchainFamiliarity", NOT_SPECIFIED),
            participated_projects: pick("knowledge", "participatedProjects", "No"),
            adoption_likelihood: pick("future", "adoptionLikelihood", NOT_SPECIFIED),
            stakeholder_views: pick("stakeholders", "stakeholderViews", NOT_SPECIFIED),
        }
    }

    /// Values in `HEADERS` order.
    #[must_use]
    pub fn values(&self) -> [&str; 9] {
        [
            &self.id,
            &self.date,
            &self.occupation,
            &self.education_level,
            &self.years_of_experience,
            &self.blockchain_familiarity,
            &self.participated_projects,
            &self.adoption_likelihood,
            &self.stakeholder_views,
        ]
    }

    /// Case-insensitive substring match against every column.
    #[must_use]
    pub fn matches(&self, filter: &str) -> bool {
        let needle = filter.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.values()
            .iter()
            .any(|value| value.to_lowercase().contains(&needle))
    }
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(display_value)
                .collect::<Vec<_>>()
                .join("; ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SubmissionDraft, SubmissionId};
    use crate::time::fixed_now;
    use serde_json::json;

    fn submission(body: Value) -> Submission {
        SubmissionDraft::from_json(body)
            .unwrap()
            .assign_id(SubmissionId::new(9), fixed_now())
    }

    #[test]
    fn flattens_sectioned_answers() {
        let row = SubmissionRow::from_submission(&submission(json!({
            "demographics": { "occupation": "Policy Analyst", "educationLevel": "PhD" },
            "knowledge": { "blockchainFamiliarity": "Expert", "participatedProjects": "Yes" },
            "future": { "adoptionLikelihood": "Very Likely" }
        })));

        assert_eq!(row.id, "9");
        assert_eq!(row.date, "2023-11-14");
        assert_eq!(row.occupation, "Policy Analyst");
        assert_eq!(row.education_level, "PhD");
        assert_eq!(row.years_of_experience, "Not specified");
        assert_eq!(row.participated_projects, "Yes");
        assert_eq!(row.adoption_likelihood, "Very Likely");
        assert_eq!(row.stakeholder_views, "Not specified");
    }

    #[test]
    fn falls_back_to_top_level_answers() {
        let row = SubmissionRow::from_submission(&submission(json!({
            "occupation": "Engineer",
            "demographics": { "occupation": "" }
        })));
        assert_eq!(row.occupation, "Engineer");
        assert_eq!(row.participated_projects, "No");
    }

    #[test]
    fn filter_is_case_insensitive() {
        let row = SubmissionRow::from_submission(&submission(json!({
            "demographics": { "occupation": "Urban Planner" }
        })));
        assert!(row.matches("urban"));
        assert!(row.matches("  "));
        assert!(!row.matches("farmer"));
    }
}
