use survey_core::model::{Submission, SubmissionId};

use super::SqliteRepository;
use super::mapping::{
    id_to_i64, map_submission_row, read_err, responses_to_text, submission_id_from_i64, write_err,
};
use crate::repository::{
    NewSubmissionRecord, StorageError, SubmissionOrder, SubmissionRepository,
};

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn insert_submission(
        &self,
        record: NewSubmissionRecord,
    ) -> Result<Submission, StorageError> {
        let responses = responses_to_text(&record.responses)?;

        let res = sqlx::query(
            r"
            INSERT INTO submissions (responses, submitted_at, started_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(responses)
        .bind(record.submitted_at)
        .bind(record.started_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(Submission {
            id: submission_id_from_i64(res.last_insert_rowid())?,
            responses: record.responses,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
        })
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, responses, submitted_at, started_at
            FROM submissions WHERE id = ?1
            ",
        )
        .bind(id_to_i64(id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_submission_row).transpose()
    }

    async fn list_submissions(
        &self,
        order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StorageError> {
        let sql = match order {
            SubmissionOrder::Oldest => {
                r"
                SELECT id, responses, submitted_at, started_at
                FROM submissions
                ORDER BY submitted_at ASC, id ASC
                "
            }
            SubmissionOrder::Newest => {
                r"
                SELECT id, responses, submitted_at, started_at
                FROM submissions
                ORDER BY submitted_at DESC, id DESC
                "
            }
        };

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;

        rows.iter().map(map_submission_row).collect()
    }

    async fn count_submissions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions")
            .fetch_one(&self.pool)
            .await
            .map_err(read_err)?;
        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }
}
