use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use storage::repository::{NewSubmissionRecord, Storage};
use survey_core::model::SubmissionDraft;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    copies: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCopies { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCopies { raw } => write!(f, "invalid --copies value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse(
        mut args: impl Iterator<Item = String>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url =
            var("SURVEY_DB_URL").unwrap_or_else(|| "sqlite://survey.sqlite3?mode=rwc".into());
        let mut copies = var("SURVEY_SEED_COPIES")
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(1);
        let mut now: Option<DateTime<Utc>> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--copies" => {
                    let value = require_value(&mut args, "--copies")?;
                    copies = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCopies { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            copies,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://survey.sqlite3?mode=rwc)");
    eprintln!("  --copies <n>              Times to insert the sample set (default: 1)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SURVEY_DB_URL, SURVEY_SEED_COPIES");
}

fn samples() -> [Value; 3] {
    [
        json!({
            "demographics": {
                "occupation": "Software Developer",
                "educationLevel": "Bachelor's Degree",
                "yearsOfExperience": "3-5 years",
                "location": "New York"
            },
            "knowledge": { "blockchainFamiliarity": "Intermediate", "technologyReadiness": "High" },
            "tokenization": {
                "infrastructureAreas": ["Transportation", "Energy"],
                "priorities": ["Security", "Scalability"]
            },
            "challenges": { "barriers": ["Regulatory Uncertainty", "Technical Complexity"] },
            "stakeholders": { "stakeholderViews": "Government" },
            "policy": { "governanceModel": "Hybrid" },
            "future": { "adoptionLikelihood": "Very Likely" },
            "feedback": { "overallSatisfaction": "Satisfied" }
        }),
        json!({
            "demographics": {
                "occupation": "Urban Planner",
                "educationLevel": "Master's Degree",
                "yearsOfExperience": "5-10 years",
                "location": "San Francisco"
            },
            "knowledge": { "blockchainFamiliarity": "Beginner", "technologyReadiness": "Medium" },
            "tokenization": {
                "infrastructureAreas": ["Housing", "Transportation"],
                "priorities": ["Transparency", "Efficiency"]
            },
            "challenges": { "barriers": ["Cost", "Public Acceptance"] },
            "stakeholders": { "stakeholderViews": "Private Sector" },
            "policy": { "governanceModel": "Centralized" },
            "future": { "adoptionLikelihood": "Likely" },
            "feedback": { "overallSatisfaction": "Very Satisfied" }
        }),
        json!({
            "demographics": {
                "occupation": "Policy Analyst",
                "educationLevel": "PhD",
                "yearsOfExperience": "10+ years",
                "location": "Washington DC"
            },
            "knowledge": { "blockchainFamiliarity": "Expert", "technologyReadiness": "Very High" },
            "tokenization": {
                "infrastructureAreas": ["Governance", "Energy", "Transportation"],
                "priorities": ["Regulatory Compliance", "Security", "Interoperability"]
            },
            "challenges": { "barriers": ["Regulatory Uncertainty", "Scalability Issues"] },
            "stakeholders": { "stakeholderViews": "Academic" },
            "policy": { "governanceModel": "Decentralized" },
            "future": { "adoptionLikelihood": "Very Likely" },
            "feedback": { "overallSatisfaction": "Very Satisfied" }
        }),
    ]
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut inserted = 0_u32;
    for copy in 0..args.copies {
        for (i, body) in samples().into_iter().enumerate() {
            let draft = SubmissionDraft::from_json(body)?;
            let offset = i64::from(copy) * 3 + i64::try_from(i)?;
            let submitted_at = now - Duration::days(offset);
            storage
                .submissions
                .insert_submission(NewSubmissionRecord::from_draft(draft, submitted_at))
                .await?;
            inserted += 1;
        }
    }

    println!("Seeded {inserted} sample submissions into {}", args.db_url);

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[&str], env: &[(&str, &str)]) -> Result<Args, ArgsError> {
        let env: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Args::parse(raw.iter().map(|s| (*s).to_owned()), |key| {
            env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn defaults_come_from_the_environment() {
        let args = parse(&[], &[]).unwrap();
        assert_eq!(args.db_url, "sqlite://survey.sqlite3?mode=rwc");
        assert_eq!(args.copies, 1);
        assert!(args.now.is_none());

        let args = parse(
            &[],
            &[("SURVEY_DB_URL", "sqlite://seed.sqlite3"), ("SURVEY_SEED_COPIES", "4")],
        )
        .unwrap();
        assert_eq!(args.db_url, "sqlite://seed.sqlite3");
        assert_eq!(args.copies, 4);
    }

    #[test]
    fn flags_override_the_environment() {
        let args = parse(
            &["--db", "sqlite://flag.sqlite3", "--copies", "2", "--now", "2023-11-14T22:13:20Z"],
            &[("SURVEY_DB_URL", "sqlite://env.sqlite3"), ("SURVEY_SEED_COPIES", "9")],
        )
        .unwrap();
        assert_eq!(args.db_url, "sqlite://flag.sqlite3");
        assert_eq!(args.copies, 2);
        assert_eq!(args.now.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--copies", "many"], &[]),
            Err(ArgsError::InvalidCopies { .. })
        ));
        assert!(matches!(
            parse(&["--now", "yesterday"], &[]),
            Err(ArgsError::InvalidNow { .. })
        ));
        assert!(matches!(
            parse(&["--db", "  "], &[]),
            Err(ArgsError::InvalidDbUrl { .. })
        ));
        assert!(matches!(
            parse(&["--db"], &[]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(parse(&["--seed"], &[]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn samples_are_valid_submissions() {
        for body in samples() {
            assert!(SubmissionDraft::from_json(body).is_ok());
        }
    }
}
