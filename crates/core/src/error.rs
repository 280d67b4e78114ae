use thiserror::Error;

use crate::model::{SubmissionError, UserError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    User(#[from] UserError),
}
