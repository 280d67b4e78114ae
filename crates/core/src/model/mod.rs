mod ids;
mod row;
mod submission;
mod user;

pub use ids::{ParseIdError, SubmissionId, UserId};
pub use row::SubmissionRow;
pub use submission::{Responses, Submission, SubmissionDraft, SubmissionError};
pub use user::{
    Email, PasswordReset, Role, User, UserError, UserProfile, Username, validate_password,
};
