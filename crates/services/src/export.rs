//! Tabular downloads of the flattened submission rows.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use survey_core::model::SubmissionRow;
use survey_core::time::day_stamp;

use crate::error::SubmissionServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownExportFormat(pub String);

impl fmt::Display for UnknownExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported export format: {} (expected csv or json)", self.0)
    }
}

impl std::error::Error for UnknownExportFormat {}

impl FromStr for ExportFormat {
    type Err = UnknownExportFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(UnknownExportFormat(s.to_owned())),
        }
    }
}

/// A rendered download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub content_type: &'static str,
    pub filename: String,
    pub body: Vec<u8>,
}

/// Render `rows` in `format`, naming the file after the UTC date of `now`.
///
/// # Errors
///
/// Returns `SubmissionServiceError::Export` if serialization fails.
pub fn render(
    format: ExportFormat,
    rows: &[SubmissionRow],
    now: DateTime<Utc>,
) -> Result<Export, SubmissionServiceError> {
    let body = match format {
        ExportFormat::Csv => to_csv(rows)?,
        ExportFormat::Json => serde_json::to_vec_pretty(rows)
            .map_err(|e| SubmissionServiceError::Export(e.to_string()))?,
    };
    Ok(Export {
        content_type: format.content_type(),
        filename: format!("submissions-{}.{}", day_stamp(now), format.extension()),
        body,
    })
}

fn to_csv(rows: &[SubmissionRow]) -> Result<Vec<u8>, SubmissionServiceError> {
    let export_err = |e: csv::Error| SubmissionServiceError::Export(e.to_string());
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(SubmissionRow::HEADERS)
        .map_err(export_err)?;
    for row in rows {
        let record = row.values().map(inert_cell);
        writer
            .write_record(record.iter().map(|cell| cell.as_bytes()))
            .map_err(export_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| SubmissionServiceError::Export(e.to_string()))
}

/// Spreadsheets evaluate cells starting with these as formulas.
const FORMULA_PREFIXES: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

fn inert_cell(value: &str) -> Cow<'_, str> {
    if value.starts_with(FORMULA_PREFIXES) {
        Cow::Owned(format!("'{value}"))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use survey_core::time::fixed_now;

    fn row(occupation: &str) -> SubmissionRow {
        SubmissionRow {
            id: "1".into(),
            date: "2023-11-14".into(),
            occupation: occupation.into(),
            education_level: "PhD".into(),
            years_of_experience: "10+ years".into(),
            blockchain_familiarity: "Expert".into(),
            participated_projects: "No".into(),
            adoption_likelihood: "Likely".into(),
            stakeholder_views: "Not specified".into(),
        }
    }

    #[test]
    fn parses_formats_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!(" json ".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn csv_quotes_embedded_commas() {
        let export = render(ExportFormat::Csv, &[row("Planner, Urban")], fixed_now()).unwrap();
        let text = String::from_utf8(export.body).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,date,occupation,educationLevel,yearsOfExperience,blockchainFamiliarity,participatedProjects,adoptionLikelihood,stakeholderViews")
        );
        assert_eq!(
            lines.next(),
            Some("1,2023-11-14,\"Planner, Urban\",PhD,10+ years,Expert,No,Likely,Not specified")
        );
        assert_eq!(export.filename, "submissions-2023-11-14.csv");
        assert_eq!(export.content_type, "text/csv; charset=utf-8");
    }

    #[test]
    fn csv_cells_never_start_a_formula() {
        let export = render(
            ExportFormat::Csv,
            &[row("=HYPERLINK(\"http://evil\",\"x\")"), row("@SUM(A1)"), row("-1")],
            fixed_now(),
        )
        .unwrap();
        let text = String::from_utf8(export.body).unwrap();
        let lines: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(
            lines[0],
            "1,2023-11-14,\"'=HYPERLINK(\"\"http://evil\"\",\"\"x\"\")\",PhD,10+ years,Expert,No,Likely,Not specified"
        );
        assert!(lines[1].starts_with("1,2023-11-14,'@SUM(A1),"));
        assert!(lines[2].starts_with("1,2023-11-14,'-1,"));
    }

    #[test]
    fn json_exports_keep_raw_values() {
        let export = render(ExportFormat::Json, &[row("=1+1")], fixed_now()).unwrap();
        let rows: serde_json::Value = serde_json::from_slice(&export.body).unwrap();
        assert_eq!(rows[0]["occupation"], "=1+1");
    }

    #[test]
    fn empty_exports_are_still_valid_files() {
        let csv = render(ExportFormat::Csv, &[], fixed_now()).unwrap();
        assert_eq!(String::from_utf8(csv.body).unwrap().lines().count(), 1);

        let json = render(ExportFormat::Json, &[], fixed_now()).unwrap();
        assert_eq!(json.body, b"[]");
        assert_eq!(json.filename, "submissions-2023-11-14.json");
    }
}
