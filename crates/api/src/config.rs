use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

use services::AuthSettings;

pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;
/// Ten years, in hours.
pub const MAX_JWT_EXPIRES_IN_HOURS: i64 = 24 * 365 * 10;
pub const MAX_JWT_COOKIE_EXPIRES_IN_DAYS: i64 = 365 * 10;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:*,http://127.0.0.1:*,https://*.vercel.app";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be set (or provided as /run/secrets/{key})")]
    Missing { key: &'static str },
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
        }
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(AppEnv::Production),
            "development" | "dev" | "test" => Ok(AppEnv::Development),
            other => Err(format!("unknown environment {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
    pub jwt_cookie_expires_in_days: i64,
    pub environment: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub body_limit_bytes: usize,
    pub reset_url_base: String,
}

impl Config {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `JWT_SECRET` is absent or a value does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), read_secret)
    }

    /// Build a config from arbitrary lookups, used by `load` and tests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `JWT_SECRET` is absent or a value does not parse.
    pub fn from_lookup(
        var: impl Fn(&str) -> Option<String>,
        secret: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let jwt_secret = var("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .or_else(|| secret("JWT_SECRET"))
            .ok_or(ConfigError::Missing { key: "JWT_SECRET" })?;

        let port: u16 = try_load(&var, "PORT", "3000")?;

        Ok(Self {
            port,
            database_url: try_load(&var, "DATABASE_URL", "sqlite://survey.sqlite3")?,
            jwt_secret,
            jwt_expires_in_hours: bounded(
                &var,
                "JWT_EXPIRES_IN_HOURS",
                "24",
                MAX_JWT_EXPIRES_IN_HOURS,
            )?,
            jwt_cookie_expires_in_days: bounded(
                &var,
                "JWT_COOKIE_EXPIRES_IN",
                "1",
                MAX_JWT_COOKIE_EXPIRES_IN_DAYS,
            )?,
            environment: try_load(&var, "APP_ENV", "development")?,
            cors_allowed_origins: split_list(&try_load::<String>(
                &var,
                "CORS_ALLOWED_ORIGINS",
                DEFAULT_CORS_ORIGINS,
            )?),
            rate_limit_max: try_load(&var, "RATE_LIMIT_MAX", "100")?,
            rate_limit_window_secs: try_load(&var, "RATE_LIMIT_WINDOW_SECS", "900")?,
            body_limit_bytes: try_load(
                &var,
                "BODY_LIMIT_BYTES",
                &DEFAULT_BODY_LIMIT_BYTES.to_string(),
            )?,
            reset_url_base: try_load(
                &var,
                "RESET_URL_BASE",
                &format!("http://localhost:{port}/reset-password"),
            )?,
        })
    }

    #[must_use]
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: Duration::hours(self.jwt_expires_in_hours),
            reset_url_base: self.reset_url_base.clone(),
        }
    }
}

fn try_load<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}

fn bounded(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
    max: i64,
) -> Result<i64, ConfigError> {
    let value: i64 = try_load(var, key, default)?;
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("must be between 1 and {max}"),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
