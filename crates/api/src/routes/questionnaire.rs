use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Map, Value, json};

use survey_core::analytics::AnalyticsReport;

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiBytes};
use crate::state::AppState;

#[derive(Serialize)]
struct AnalyticsResponse {
    status: &'static str,
    #[serde(flatten)]
    report: AnalyticsReport,
}

/// A missing body is treated like `{}` so it gets the "no data" message.
pub async fn submit_handler(
    State(state): State<AppState>,
    ApiBytes(body): ApiBytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?
    };
    let submission = state.services.submissions().submit(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": submission })),
    ))
}

pub async fn analytics_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.analytics().report().await?;
    Ok(Json(AnalyticsResponse {
        status: "success",
        report,
    }))
}
