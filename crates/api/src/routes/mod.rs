pub mod admin;
pub mod auth;
pub mod health;
pub mod questionnaire;
pub mod users;

use axum::response::IntoResponse;

use crate::error::{ApiError, ROUTE_NOT_FOUND};

pub async fn not_found_handler() -> impl IntoResponse {
    ApiError::NotFound(ROUTE_NOT_FOUND.to_owned())
}
