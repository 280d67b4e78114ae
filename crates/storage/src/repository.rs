use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use survey_core::model::{
    Email, Responses, Role, Submission, SubmissionDraft, SubmissionId, User, UserId, Username,
};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a submission; the repository assigns the id.
#[derive(Debug, Clone)]
pub struct NewSubmissionRecord {
    pub responses: Responses,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl NewSubmissionRecord {
    #[must_use]
    pub fn from_draft(draft: SubmissionDraft, submitted_at: DateTime<Utc>) -> Self {
        Self {
            responses: draft.responses,
            submitted_at,
            started_at: draft.started_at,
        }
    }
}

/// Insert shape for an account; the repository assigns the id.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: Username,
    pub email: Option<Email>,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Sort order for submission listings, by `submitted_at` then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOrder {
    Oldest,
    Newest,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Persist a new submission and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the submission cannot be stored.
    async fn insert_submission(
        &self,
        record: NewSubmissionRecord,
    ) -> Result<Submission, StorageError>;

    /// Fetch a submission by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_submissions(
        &self,
        order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_submissions(&self) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the username or email is taken.
    async fn insert_user(&self, record: NewUserRecord) -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StorageError>;

    /// Find the account holding an unexpired reset token with this digest.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StorageError>;

    /// All accounts ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    /// Overwrite every mutable field of an existing account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the account is gone and
    /// `StorageError::Conflict` when the new username or email is taken.
    async fn update_user(&self, user: &User) -> Result<(), StorageError>;

    /// Returns whether an account was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn delete_user(&self, id: UserId) -> Result<bool, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_submission_id: u64,
    next_user_id: u64,
    submissions: BTreeMap<SubmissionId, Submission>,
    users: BTreeMap<UserId, User>,
}

impl MemoryState {
    fn identity_taken(&self, except: Option<UserId>, username: &Username, email: Option<&Email>) -> bool {
        self.users.values().any(|existing| {
            Some(existing.id) != except
                && (existing.username == *username
                    || (email.is_some() && existing.email.as_ref() == email))
        })
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn insert_submission(
        &self,
        record: NewSubmissionRecord,
    ) -> Result<Submission, StorageError> {
        let mut guard = self.lock()?;
        guard.next_submission_id += 1;
        let id = SubmissionId::new(guard.next_submission_id);
        let submission = Submission {
            id,
            responses: record.responses,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
        };
        guard.submissions.insert(id, submission.clone());
        Ok(submission)
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError> {
        Ok(self.lock()?.submissions.get(&id).cloned())
    }

    async fn list_submissions(
        &self,
        order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StorageError> {
        let guard = self.lock()?;
        let mut all: Vec<Submission> = guard.submissions.values().cloned().collect();
        all.sort_by(|a, b| (a.submitted_at, a.id).cmp(&(b.submitted_at, b.id)));
        if order == SubmissionOrder::Newest {
            all.reverse();
        }
        Ok(all)
    }

    async fn count_submissions(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.submissions.len() as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, record: NewUserRecord) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        if guard.identity_taken(None, &record.username, record.email.as_ref()) {
            return Err(StorageError::Conflict);
        }
        guard.next_user_id += 1;
        let user = User {
            id: UserId::new(guard.next_user_id),
            username: record.username,
            email: record.email,
            role: record.role,
            password_hash: record.password_hash,
            reset: None,
            created_at: record.created_at,
            updated_at: record.created_at,
        };
        guard.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username.as_str() == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email.as_ref() == Some(email))
            .cloned())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| {
                u.reset
                    .as_ref()
                    .is_some_and(|r| r.token_hash == token_hash && !r.is_expired(now))
            })
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&user.id) {
            return Err(StorageError::NotFound);
        }
        if guard.identity_taken(Some(user.id), &user.username, user.email.as_ref()) {
            return Err(StorageError::Conflict);
        }
        guard.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StorageError> {
        Ok(self.lock()?.users.remove(&id).is_some())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub submissions: Arc<dyn SubmissionRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let submissions: Arc<dyn SubmissionRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self { submissions, users }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use survey_core::model::PasswordReset;
    use survey_core::time::fixed_now;

    fn draft(body: serde_json::Value) -> SubmissionDraft {
        SubmissionDraft::from_json(body).unwrap()
    }

    fn new_user(name: &str, email: Option<&str>) -> NewUserRecord {
        NewUserRecord {
            username: Username::parse(name).unwrap(),
            email: email.map(|e| Email::parse(e).unwrap()),
            role: Role::User,
            password_hash: "hash".into(),
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn lists_submissions_in_both_orders() {
        let repo = InMemoryRepository::new();
        let later = repo
            .insert_submission(NewSubmissionRecord::from_draft(
                draft(json!({ "a": 1 })),
                fixed_now() + Duration::hours(1),
            ))
            .await
            .unwrap();
        let earlier = repo
            .insert_submission(NewSubmissionRecord::from_draft(
                draft(json!({ "b": 2 })),
                fixed_now(),
            ))
            .await
            .unwrap();

        let oldest = repo.list_submissions(SubmissionOrder::Oldest).await.unwrap();
        assert_eq!(oldest[0].id, earlier.id);
        let newest = repo.list_submissions(SubmissionOrder::Newest).await.unwrap();
        assert_eq!(newest[0].id, later.id);
        assert_eq!(repo.count_submissions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rejects_duplicate_usernames_and_emails() {
        let repo = InMemoryRepository::new();
        repo.insert_user(new_user("alice", Some("a@example.com")))
            .await
            .unwrap();

        let dup_name = repo.insert_user(new_user("alice", None)).await;
        assert!(matches!(dup_name, Err(StorageError::Conflict)));

        let dup_email = repo
            .insert_user(new_user("bob", Some("A@example.com")))
            .await;
        assert!(matches!(dup_email, Err(StorageError::Conflict)));
    }

    #[tokio::test]
    async fn reset_lookup_ignores_expired_tokens() {
        let repo = InMemoryRepository::new();
        let mut user = repo.insert_user(new_user("carol", None)).await.unwrap();
        user.reset = Some(PasswordReset {
            token_hash: "digest".into(),
            expires_at: fixed_now() + Duration::hours(1),
        });
        repo.update_user(&user).await.unwrap();

        let found = repo.find_by_reset_token("digest", fixed_now()).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let expired = repo
            .find_by_reset_token("digest", fixed_now() + Duration::hours(2))
            .await
            .unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = InMemoryRepository::new();
        let user = repo.insert_user(new_user("dave", None)).await.unwrap();
        assert!(repo.delete_user(user.id).await.unwrap());
        assert!(!repo.delete_user(user.id).await.unwrap());
        assert!(matches!(
            repo.update_user(&user).await,
            Err(StorageError::NotFound)
        ));
    }
}
