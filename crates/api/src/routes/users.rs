use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::{ApiJson, AuthUser};
use crate::state::AppState;

/// Only `username` is honoured; other fields in the body are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeRequest {
    #[serde(default)]
    pub username: Option<String>,
}

pub async fn me_handler(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(json!({ "status": "success", "data": { "user": user.profile() } }))
}

pub async fn update_me_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UpdateMeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .services
        .users()
        .update_me(user.id, payload.username.as_deref())
        .await?;
    Ok(Json(
        json!({ "status": "success", "data": { "user": updated.profile() } }),
    ))
}
