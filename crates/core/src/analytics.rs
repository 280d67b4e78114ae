//! Aggregate statistics over stored submissions.
//!
//! Every function here is a single pass over the submissions followed by a
//! sort. Answers are free-form JSON, so only "truthy" scalar answers are
//! counted: non-empty strings, non-zero numbers and `true`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::model::Submission;
use crate::time::day_stamp;

/// A submission with at least this many sections counts as completed.
pub const COMPLETE_SECTION_THRESHOLD: usize = 3;

/// Sections of the questionnaire in the order respondents see them.
pub const QUESTIONNAIRE_SECTIONS: [&str; 6] = [
    "demographics",
    "knowledge",
    "policy",
    "tokenization",
    "stakeholders",
    "future",
];

const TOP_N: usize = 5;
const NOT_AVAILABLE: &str = "N/A";

const HIGH_FAMILIARITY: [&str; 6] = [
    "expert",
    "advanced",
    "intermediate",
    "very familiar",
    "extremely familiar",
    "moderately familiar",
];
const POSITIVE_ADOPTION: [&str; 2] = ["very likely", "likely"];

//
// ─── REPORT TYPES ──────────────────────────────────────────────────────────────
//

/// Count of one answer value and its share of the counted answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub name: String,
    pub value: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: String,
    pub submissions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePatterns {
    pub average_responses_per_submission: f64,
    pub most_common_section_combinations: Vec<Tally>,
    pub drop_off_points: Vec<Tally>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeCorrelation {
    pub high_knowledge_adoption: u32,
    pub low_knowledge_adoption: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicInsights {
    pub total_regions: usize,
    pub top_regions: Vec<Tally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedInsights {
    pub top_occupations: Vec<Tally>,
    pub education_distribution: Vec<Tally>,
    pub experience_levels: Vec<Tally>,
    pub knowledge_correlation: KnowledgeCorrelation,
    pub geographic_insights: GeographicInsights,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_responses: u32,
    pub completed_responses: u32,
    pub completion_rate: u32,
    pub avg_completion_time: String,
    pub top_occupation: String,
    pub top_education: String,
    pub top_knowledge_level: String,
    pub adoption_trend: String,
}

/// Everything the admin dashboard renders, computed in one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_responses: u32,
    pub completed_responses: u32,
    pub completion_rate: u32,
    pub avg_completion_time: String,
    pub last_updated: DateTime<Utc>,

    pub demographics: Vec<Tally>,
    pub education: Vec<Tally>,
    pub experience: Vec<Tally>,
    pub adoption: Vec<Tally>,
    pub knowledge: Vec<Tally>,
    pub benefit_areas: Vec<Tally>,
    pub stakeholder_views: Vec<Tally>,
    pub governance_models: Vec<Tally>,

    pub time_series_data: Vec<TimeSeriesPoint>,
    pub response_patterns: ResponsePatterns,
    pub detailed_insights: DetailedInsights,
    pub geographic_data: Vec<Tally>,
    pub satisfaction_metrics: Vec<Tally>,
    pub technology_readiness: Vec<Tally>,
    pub barriers: Vec<Tally>,
    pub priorities: Vec<Tally>,

    pub summary: AnalyticsSummary,
}

//
// ─── COUNTING ──────────────────────────────────────────────────────────────────
//

/// Insertion-ordered counter; ties keep the order values were first seen.
#[derive(Debug, Default)]
struct Counter {
    index: HashMap<String, usize>,
    entries: Vec<(String, u32)>,
    total: u32,
}

impl Counter {
    fn add(&mut self, name: String) {
        self.total += 1;
        if let Some(&i) = self.index.get(&name) {
            self.entries[i].1 += 1;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, 1));
        }
    }

    fn into_tallies(self) -> Vec<Tally> {
        let total = self.total;
        let mut tallies: Vec<Tally> = self
            .entries
            .into_iter()
            .map(|(name, value)| Tally {
                name,
                value,
                percentage: percent(value, total),
            })
            .collect();
        tallies.sort_by(|a, b| b.value.cmp(&a.value));
        tallies
    }
}

/// `round(part / whole * 100)`, zero when `whole` is zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

fn truthy_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(number_label(n)),
        Value::Bool(true) => Some("true".to_owned()),
        _ => None,
    }
}

/// Whole-valued floats print without a fraction, so `1.0` and `1` share a label.
#[allow(clippy::cast_possible_truncation)]
fn number_label(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn custom_field_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("custom{}{}", first.to_uppercase(), chars.as_str()),
        None => "custom".to_owned(),
    }
}

/// Tallies a single-choice question at `responses[section][field]`.
///
/// An answer of exactly `"Other"` is replaced by the free-text
/// `custom<Field>` answer of the same section when one was given.
#[must_use]
pub fn count_occurrences(submissions: &[Submission], section: &str, field: &str) -> Vec<Tally> {
    let custom_field = custom_field_name(field);
    let mut counter = Counter::default();

    for submission in submissions {
        let Some(mut label) = submission.answer(section, field).and_then(truthy_label) else {
            continue;
        };
        if label == "Other" {
            if let Some(custom) = submission
                .answer(section, &custom_field)
                .and_then(truthy_label)
            {
                label = custom;
            }
        }
        counter.add(label);
    }

    counter.into_tallies()
}

/// Tallies a checkbox question; each selected option counts once and
/// percentages are relative to all selections.
#[must_use]
pub fn count_multiple_selections(
    submissions: &[Submission],
    section: &str,
    field: &str,
) -> Vec<Tally> {
    let mut counter = Counter::default();

    for submission in submissions {
        match submission.answer(section, field) {
            Some(Value::Array(items)) => {
                for label in items.iter().filter_map(truthy_label) {
                    counter.add(label);
                }
            }
            Some(value) => {
                if let Some(label) = truthy_label(value) {
                    counter.add(label);
                }
            }
            None => {}
        }
    }

    counter.into_tallies()
}

//
// ─── COMPLETION & TIMING ───────────────────────────────────────────────────────
//

#[must_use]
pub fn completed_count(submissions: &[Submission]) -> u32 {
    len_u32(
        submissions
            .iter()
            .filter(|s| s.section_count() >= COMPLETE_SECTION_THRESHOLD)
            .count(),
    )
}

/// Submissions per UTC day, in the order days first appear in the input.
#[must_use]
pub fn time_series(submissions: &[Submission]) -> Vec<TimeSeriesPoint> {
    let mut counter = Counter::default();
    for submission in submissions {
        counter.add(day_stamp(submission.submitted_at));
    }
    counter
        .entries
        .into_iter()
        .map(|(date, submissions)| TimeSeriesPoint { date, submissions })
        .collect()
}

/// Mean form-filling time in minutes, for submissions that recorded a start.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_completion_time(submissions: &[Submission]) -> String {
    let durations: Vec<i64> = submissions
        .iter()
        .filter_map(Submission::completion_time)
        .map(|d| d.num_seconds())
        .collect();
    if durations.is_empty() {
        return "0 min".to_owned();
    }
    let mean_secs = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
    format!("{:.1} min", mean_secs / 60.0)
}

//
// ─── PATTERNS ──────────────────────────────────────────────────────────────────
//

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn response_patterns(submissions: &[Submission]) -> ResponsePatterns {
    if submissions.is_empty() {
        return ResponsePatterns {
            average_responses_per_submission: 0.0,
            most_common_section_combinations: Vec::new(),
            drop_off_points: Vec::new(),
        };
    }

    let total_sections: usize = submissions.iter().map(Submission::section_count).sum();

    let mut combinations = Counter::default();
    let mut drop_offs = Counter::default();
    for submission in submissions {
        let mut sections: Vec<&str> = submission.sections().collect();
        sections.sort_unstable();
        combinations.add(sections.join("+"));

        if submission.section_count() < COMPLETE_SECTION_THRESHOLD {
            if let Some(missing) = QUESTIONNAIRE_SECTIONS
                .iter()
                .find(|name| !submission.responses.contains_key(**name))
            {
                drop_offs.add((*missing).to_owned());
            }
        }
    }

    let mut most_common = combinations.into_tallies();
    most_common.truncate(TOP_N);

    ResponsePatterns {
        average_responses_per_submission: total_sections as f64 / submissions.len() as f64,
        most_common_section_combinations: most_common,
        drop_off_points: drop_offs.into_tallies(),
    }
}

/// Splits positive adoption answers by how familiar the respondent is with blockchain.
#[must_use]
pub fn knowledge_correlation(submissions: &[Submission]) -> KnowledgeCorrelation {
    let mut correlation = KnowledgeCorrelation::default();
    for submission in submissions {
        let familiarity = submission
            .answer("knowledge", "blockchainFamiliarity")
            .and_then(truthy_label);
        let adoption = submission
            .answer("future", "adoptionLikelihood")
            .and_then(truthy_label);
        let (Some(familiarity), Some(adoption)) = (familiarity, adoption) else {
            continue;
        };
        if !POSITIVE_ADOPTION.contains(&adoption.to_lowercase().as_str()) {
            continue;
        }
        if HIGH_FAMILIARITY.contains(&familiarity.to_lowercase().as_str()) {
            correlation.high_knowledge_adoption += 1;
        } else {
            correlation.low_knowledge_adoption += 1;
        }
    }
    correlation
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Builds the dashboard report. `submissions` should be oldest first so the
/// time series reads chronologically.
#[must_use]
pub fn build_report(submissions: &[Submission], now: DateTime<Utc>) -> AnalyticsReport {
    let total_responses = len_u32(submissions.len());
    let completed_responses = completed_count(submissions);
    let completion_rate = percent(completed_responses, total_responses);
    let avg_completion_time = average_completion_time(submissions);

    let demographics = count_occurrences(submissions, "demographics", "occupation");
    let education = count_occurrences(submissions, "demographics", "educationLevel");
    let experience = count_occurrences(submissions, "demographics", "yearsOfExperience");
    let geographic_data = count_occurrences(submissions, "demographics", "location");

    let knowledge = count_occurrences(submissions, "knowledge", "blockchainFamiliarity");
    let technology_readiness = count_occurrences(submissions, "knowledge", "technologyReadiness");
    let adoption = count_occurrences(submissions, "future", "adoptionLikelihood");

    let benefit_areas = count_multiple_selections(submissions, "tokenization", "infrastructureAreas");
    let priorities = count_multiple_selections(submissions, "tokenization", "priorities");
    let barriers = count_multiple_selections(submissions, "challenges", "barriers");

    let stakeholder_views = count_occurrences(submissions, "stakeholders", "stakeholderViews");
    let governance_models = count_occurrences(submissions, "policy", "governanceModel");
    let satisfaction_metrics = count_occurrences(submissions, "feedback", "overallSatisfaction");

    let summary = AnalyticsSummary {
        total_responses,
        completed_responses,
        completion_rate,
        avg_completion_time: avg_completion_time.clone(),
        top_occupation: top_name(&demographics),
        top_education: top_name(&education),
        top_knowledge_level: top_name(&knowledge),
        adoption_trend: top_name(&adoption),
    };

    let detailed_insights = DetailedInsights {
        top_occupations: top_n(&demographics),
        education_distribution: education.clone(),
        experience_levels: experience.clone(),
        knowledge_correlation: knowledge_correlation(submissions),
        geographic_insights: GeographicInsights {
            total_regions: geographic_data.len(),
            top_regions: top_n(&geographic_data),
        },
    };

    AnalyticsReport {
        total_responses,
        completed_responses,
        completion_rate,
        avg_completion_time,
        last_updated: now,
        demographics,
        education,
        experience,
        adoption,
        knowledge,
        benefit_areas,
        stakeholder_views,
        governance_models,
        time_series_data: time_series(submissions),
        response_patterns: response_patterns(submissions),
        detailed_insights,
        geographic_data,
        satisfaction_metrics,
        technology_readiness,
        barriers,
        priorities,
        summary,
    }
}

fn top_name(tallies: &[Tally]) -> String {
    tallies
        .first()
        .map_or_else(|| NOT_AVAILABLE.to_owned(), |t| t.name.clone())
}

fn top_n(tallies: &[Tally]) -> Vec<Tally> {
    tallies.iter().take(TOP_N).cloned().collect()
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SubmissionDraft, SubmissionId};
    use crate::time::fixed_now;
    use chrono::Duration;
    use serde_json::json;

    fn submission(id: u64, body: Value) -> Submission {
        SubmissionDraft::from_json(body)
            .unwrap()
            .assign_id(SubmissionId::new(id), fixed_now())
    }

    fn names(tallies: &[Tally]) -> Vec<&str> {
        tallies.iter().map(|t| t.name.as_str()).collect()
    }

    fn sample() -> Vec<Submission> {
        vec![
            submission(
                1,
                json!({
                    "demographics": { "occupation": "Software Developer", "location": "New York" },
                    "knowledge": { "blockchainFamiliarity": "Intermediate" },
                    "tokenization": { "infrastructureAreas": ["Transportation", "Energy"] },
                    "future": { "adoptionLikelihood": "Very Likely" }
                }),
            ),
            submission(
                2,
                json!({
                    "demographics": { "occupation": "Urban Planner", "location": "San Francisco" },
                    "knowledge": { "blockchainFamiliarity": "Beginner" },
                    "tokenization": { "infrastructureAreas": ["Housing", "Transportation"] },
                    "future": { "adoptionLikelihood": "Likely" }
                }),
            ),
            submission(
                3,
                json!({
                    "demographics": { "occupation": "Other", "customOccupation": "Mayor" }
                }),
            ),
            submission(
                4,
                json!({
                    "demographics": { "occupation": "Urban Planner" },
                    "knowledge": { "blockchainFamiliarity": "" }
                }),
            ),
        ]
    }

    #[test]
    fn occurrences_sort_by_count_and_substitute_other() {
        let tallies = count_occurrences(&sample(), "demographics", "occupation");
        assert_eq!(names(&tallies), ["Urban Planner", "Software Developer", "Mayor"]);
        assert_eq!(tallies[0].value, 2);
        assert_eq!(tallies[0].percentage, 50);
        assert_eq!(tallies[1].percentage, 25);
    }

    #[test]
    fn other_without_custom_text_stays_other() {
        let subs = vec![submission(1, json!({ "policy": { "governanceModel": "Other" } }))];
        let tallies = count_occurrences(&subs, "policy", "governanceModel");
        assert_eq!(names(&tallies), ["Other"]);
        assert_eq!(tallies[0].percentage, 100);
    }

    #[test]
    fn empty_and_falsy_answers_are_skipped() {
        let subs = vec![
            submission(1, json!({ "k": { "f": "" } })),
            submission(2, json!({ "k": { "f": 0 } })),
            submission(3, json!({ "k": { "f": false } })),
            submission(4, json!({ "k": { "f": null } })),
            submission(5, json!({ "k": { "f": ["a"] } })),
            submission(6, json!({ "k": { "f": 4 } })),
            submission(7, json!({ "k": "not an object" })),
        ];
        let tallies = count_occurrences(&subs, "k", "f");
        assert_eq!(names(&tallies), ["4"]);
    }

    #[test]
    fn whole_floats_share_the_integer_label() {
        let subs = vec![
            submission(1, json!({ "k": { "f": 1.0 } })),
            submission(2, json!({ "k": { "f": 1 } })),
            submission(3, json!({ "k": { "f": 2.5 } })),
        ];
        let tallies = count_occurrences(&subs, "k", "f");
        assert_eq!(names(&tallies), ["1", "2.5"]);
        assert_eq!(tallies[0].value, 2);
    }

    #[test]
    fn multiple_selections_count_each_option() {
        let tallies = count_multiple_selections(&sample(), "tokenization", "infrastructureAreas");
        assert_eq!(names(&tallies), ["Transportation", "Energy", "Housing"]);
        assert_eq!(tallies[0].value, 2);
        assert_eq!(tallies[0].percentage, 50);
        assert_eq!(tallies[1].percentage, 25);
    }

    #[test]
    fn multiple_selections_accept_scalar_answers() {
        let subs = vec![
            submission(1, json!({ "challenges": { "barriers": "Cost" } })),
            submission(2, json!({ "challenges": { "barriers": ["Cost", "", null] } })),
        ];
        let tallies = count_multiple_selections(&subs, "challenges", "barriers");
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].value, 2);
        assert_eq!(tallies[0].percentage, 100);
    }

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn completion_uses_section_threshold() {
        let subs = sample();
        assert_eq!(completed_count(&subs), 2);
        let report = build_report(&subs, fixed_now());
        assert_eq!(report.completion_rate, 50);
    }

    #[test]
    fn time_series_groups_by_day_in_input_order() {
        let mut subs = sample();
        subs[2].submitted_at = fixed_now() + Duration::days(1);
        subs[3].submitted_at = fixed_now() + Duration::days(1);

        let series = time_series(&subs);
        assert_eq!(
            series,
            vec![
                TimeSeriesPoint { date: "2023-11-14".into(), submissions: 2 },
                TimeSeriesPoint { date: "2023-11-15".into(), submissions: 2 },
            ]
        );
    }

    #[test]
    fn average_completion_time_uses_recorded_starts() {
        let mut subs = sample();
        assert_eq!(average_completion_time(&subs), "0 min");

        subs[0].started_at = Some(fixed_now() - Duration::minutes(6));
        subs[1].started_at = Some(fixed_now() - Duration::minutes(9));
        assert_eq!(average_completion_time(&subs), "7.5 min");
    }

    #[test]
    fn patterns_report_combinations_and_drop_offs() {
        let patterns = response_patterns(&sample());
        assert!((patterns.average_responses_per_submission - 2.75).abs() < f64::EPSILON);
        assert_eq!(
            patterns.most_common_section_combinations[0].name,
            "demographics+future+knowledge+tokenization"
        );
        assert_eq!(patterns.most_common_section_combinations[0].value, 2);
        // submission 3 stops after demographics, submission 4 after knowledge
        assert_eq!(names(&patterns.drop_off_points), ["knowledge", "policy"]);
    }

    #[test]
    fn knowledge_correlation_splits_positive_adopters() {
        let correlation = knowledge_correlation(&sample());
        assert_eq!(correlation.high_knowledge_adoption, 1);
        assert_eq!(correlation.low_knowledge_adoption, 1);
    }

    #[test]
    fn report_wires_summary_and_insights() {
        let report = build_report(&sample(), fixed_now());
        assert_eq!(report.total_responses, 4);
        assert_eq!(report.summary.top_occupation, "Urban Planner");
        assert_eq!(report.summary.top_education, "N/A");
        assert_eq!(report.summary.adoption_trend, "Very Likely");
        assert_eq!(report.detailed_insights.geographic_insights.total_regions, 2);
        assert_eq!(report.last_updated, fixed_now());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalResponses"], 4);
        assert_eq!(json["benefitAreas"][0]["name"], "Transportation");
        assert!(json["responsePatterns"]["averageResponsesPerSubmission"].is_number());
        assert!(json["detailedInsights"]["knowledgeCorrelation"]["highKnowledgeAdoption"].is_number());
    }

    #[test]
    fn empty_report_is_zeroed() {
        let report = build_report(&[], fixed_now());
        assert_eq!(report.total_responses, 0);
        assert_eq!(report.completion_rate, 0);
        assert_eq!(report.avg_completion_time, "0 min");
        assert!(report.demographics.is_empty());
        assert!(report.time_series_data.is_empty());
        assert_eq!(report.summary.top_occupation, "N/A");
    }
}
