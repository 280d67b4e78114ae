//! `SQLite` backend: one pool serves both the submission and user tables.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{Storage, SubmissionRepository, UserRepository};

mod mapping;
mod migrate;
mod submission_repo;
mod user_repo;

const MAX_CONNECTIONS: u32 = 5;
const LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("invalid database url {url:?}: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool on `database_url` with foreign keys, WAL and a busy
    /// timeout on every connection, then bring the schema up to date.
    ///
    /// # Errors
    ///
    /// `SqliteInitError::BadUrl` when the url does not parse, otherwise
    /// `SqliteInitError::Sqlx` for connection or migration failures.
    pub async fn open(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|source| SqliteInitError::BadUrl {
                url: database_url.to_owned(),
                source,
            })?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(LOCK_WAIT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(LOCK_WAIT)
            .connect_with(options)
            .await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

impl Storage {
    /// Submissions and users share one `SqliteRepository`.
    ///
    /// # Errors
    ///
    /// Anything `SqliteRepository::open` reports.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::open(database_url).await?;
        let submissions: Arc<dyn SubmissionRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Ok(Self { submissions, users })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unparseable_urls_are_reported_with_the_url() {
        let url = "sqlite://survey.sqlite3?mode=sideways";
        let err = SqliteRepository::open(url).await.err().unwrap();
        assert!(matches!(err, SqliteInitError::BadUrl { url: ref reported, .. } if reported == url));
    }

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }
}
