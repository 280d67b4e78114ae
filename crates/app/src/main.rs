use std::fmt;

use services::{Clock, UserService};
use storage::repository::Storage;
use survey_api::config::Config;
use survey_core::model::Role;
use tracing::info;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingRequired { flag: &'static str, env: &'static str },
    UnknownArg(String),
    InvalidPort { raw: String },
    InvalidDbUrl { raw: String },
    InvalidRole { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingRequired { flag, env } => {
                write!(f, "{flag} is required (or set {env})")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidRole { raw } => {
                write!(f, "invalid --role value (expected user or admin): {raw}")
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  survey serve       [--db <sqlite_url>] [--port <port>]");
    eprintln!("  survey init-admin  [--db <sqlite_url>] --username <name> --password <password>");
    eprintln!("  survey create-user [--db <sqlite_url>] --username <name> --password <password>");
    eprintln!("                     [--email <address>] [--role user|admin]");
    eprintln!();
    eprintln!("`serve` is the default when no subcommand is given.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DATABASE_URL, PORT, JWT_SECRET (required for serve), APP_ENV,");
    eprintln!("  JWT_EXPIRES_IN_HOURS, JWT_COOKIE_EXPIRES_IN, CORS_ALLOWED_ORIGINS,");
    eprintln!("  RATE_LIMIT_MAX, RATE_LIMIT_WINDOW_SECS, BODY_LIMIT_BYTES, RESET_URL_BASE,");
    eprintln!("  ADMIN_USERNAME / ADMIN_PASSWORD (init-admin), RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    InitAdmin,
    CreateUser,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "serve" => Some(Self::Serve),
            "init-admin" => Some(Self::InitAdmin),
            "create-user" => Some(Self::CreateUser),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    email: Option<String>,
    role: Option<Role>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            username: std::env::var("ADMIN_USERNAME").ok(),
            password: std::env::var("ADMIN_PASSWORD").ok(),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(value);
                }
                "--port" => {
                    let value = require_value(args, "--port")?;
                    let port = value
                        .parse::<u16>()
                        .map_err(|_| ArgsError::InvalidPort { raw: value.clone() })?;
                    parsed.port = Some(port);
                }
                "--username" => parsed.username = Some(require_value(args, "--username")?),
                "--password" => parsed.password = Some(require_value(args, "--password")?),
                "--email" => parsed.email = Some(require_value(args, "--email")?),
                "--role" => {
                    let value = require_value(args, "--role")?;
                    let role = value
                        .parse::<Role>()
                        .map_err(|_| ArgsError::InvalidRole { raw: value.clone() })?;
                    parsed.role = Some(role);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn credentials(&self) -> Result<(&str, &str), ArgsError> {
        let username = self.username.as_deref().ok_or(ArgsError::MissingRequired {
            flag: "--username",
            env: "ADMIN_USERNAME",
        })?;
        let password = self.password.as_deref().ok_or(ArgsError::MissingRequired {
            flag: "--password",
            env: "ADMIN_PASSWORD",
        })?;
        Ok((username, password))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_storage(db_url: String) -> Result<Storage, Box<dyn std::error::Error>> {
    let db_url = normalize_sqlite_url(db_url);
    prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url).await?;
    info!(%db_url, "database ready");
    Ok(storage)
}

fn database_url(args: &Args) -> String {
    args.db_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://survey.sqlite3".into())
}

async fn serve(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(db_url) = args.db_url {
        config.database_url = db_url;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let storage = open_storage(config.database_url.clone()).await?;
    let services =
        services::AppServices::new(&storage, Clock::system(), &config.auth_settings())?;
    survey_api::start_server(config, services).await?;
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Serve,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Serve,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    survey_api::init_tracing();

    match cmd {
        Command::Serve => serve(args).await,
        Command::InitAdmin => {
            let (username, password) = args.credentials()?;
            let storage = open_storage(database_url(&args)).await?;
            let users = UserService::new(Clock::system(), storage.users);
            let (admin, created) = users.ensure_admin(username, password).await?;
            if created {
                println!("Admin user {} created (id {})", admin.username, admin.id);
            } else {
                println!("User {} promoted to admin and password updated", admin.username);
            }
            Ok(())
        }
        Command::CreateUser => {
            let (username, password) = args.credentials()?;
            let storage = open_storage(database_url(&args)).await?;
            let users = UserService::new(Clock::system(), storage.users);
            let user = users
                .create_user(
                    username,
                    password,
                    args.email.as_deref(),
                    args.role.unwrap_or_default(),
                )
                .await?;
            println!("User {} created with role {} (id {})", user.username, user.role, user.id);
            Ok(())
        }
    }
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

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = raw.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter)
    }

    #[test]
    fn parses_serve_overrides() {
        let args = parse(&["--db", "sqlite://tmp/x.sqlite3", "--port", "8080"]).unwrap();
        assert_eq!(args.db_url.as_deref(), Some("sqlite://tmp/x.sqlite3"));
        assert_eq!(args.port, Some(8080));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--port", "http"]),
            Err(ArgsError::InvalidPort { .. })
        ));
        assert!(matches!(
            parse(&["--role", "owner"]),
            Err(ArgsError::InvalidRole { .. })
        ));
        assert!(matches!(
            parse(&["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(parse(&["--nope"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn normalizes_relative_paths() {
        assert_eq!(
            normalize_sqlite_url("sqlite://already.sqlite3".into()),
            "sqlite://already.sqlite3"
        );
        let normalized = normalize_sqlite_url("data/survey.sqlite3".into());
        assert!(normalized.starts_with("sqlite:///"));
        assert!(normalized.ends_with("data/survey.sqlite3"));
    }
}
