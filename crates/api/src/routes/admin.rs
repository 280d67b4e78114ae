use axum::{
    Json,
    extract::State,
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use services::{ExportFormat, UserPatch};
use survey_core::model::{Role, Submission, SubmissionId, SubmissionRow, UserError, UserId, UserProfile};

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

// ─── USERS ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UpdateUserRequest {
    fn into_patch(self) -> Result<UserPatch, ApiError> {
        let role = self
            .role
            .map(|raw| raw.parse::<Role>())
            .transpose()
            .map_err(|e: UserError| ApiError::BadRequest(e.to_string()))?;
        Ok(UserPatch {
            username: self.username,
            email: self.email,
            role,
        })
    }
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let users: Vec<UserProfile> = state
        .services
        .users()
        .list_users()
        .await?
        .iter()
        .map(|u| u.profile())
        .collect();
    Ok(Json(json!({
        "status": "success",
        "results": users.len(),
        "data": { "users": users },
    })))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users().get_user(id).await?;
    Ok(Json(
        json!({ "status": "success", "data": { "user": user.profile() } }),
    ))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users()
        .update_user(id, payload.into_patch()?)
        .await?;
    info!(admin_id = %admin.id, user_id = %id, "admin updated user");
    Ok(Json(
        json!({ "status": "success", "data": { "user": user.profile() } }),
    ))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.users().delete_user(id).await?;
    info!(admin_id = %admin.id, user_id = %id, "admin deleted user");
    Ok(StatusCode::NO_CONTENT)
}

// ─── SUBMISSIONS ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

/// A stored submission plus its flattened table row.
#[derive(Debug, Serialize)]
pub struct SubmissionListItem {
    #[serde(flatten)]
    pub submission: Submission,
    pub summary: SubmissionRow,
}

impl From<Submission> for SubmissionListItem {
    fn from(submission: Submission) -> Self {
        let summary = SubmissionRow::from_submission(&submission);
        Self {
            submission,
            summary,
        }
    }
}

pub async fn list_submissions_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let submissions: Vec<SubmissionListItem> = state
        .services
        .submissions()
        .list(query.q.as_deref())
        .await?
        .into_iter()
        .map(SubmissionListItem::from)
        .collect();
    Ok(Json(json!({
        "status": "success",
        "results": submissions.len(),
        "submissions": submissions,
    })))
}

pub async fn get_submission_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<SubmissionId>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = state.services.submissions().get(id).await?;
    Ok(Json(json!({
        "status": "success",
        "data": SubmissionListItem::from(submission),
    })))
}

pub async fn export_submissions_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };
    let export = state
        .services
        .submissions()
        .export(format, query.q.as_deref())
        .await?;
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        [
            (CONTENT_TYPE, export.content_type.to_owned()),
            (CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    ))
}
