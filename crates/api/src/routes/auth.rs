use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use serde_json::{Value, json};

use services::Session;

use crate::config::Config;
use crate::error::ApiError;
use crate::extract::{ApiJson, COOKIE_NAME};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.environment.is_production())
        .max_age(time::Duration::days(config.jwt_cookie_expires_in_days))
        .build()
}

fn session_response(
    state: &AppState,
    jar: CookieJar,
    status: StatusCode,
    session: Session,
) -> (StatusCode, CookieJar, Json<Value>) {
    let jar = jar.add(session_cookie(&state.config, session.token.clone()));
    let body = json!({
        "status": "success",
        "token": session.token,
        "data": { "user": session.user.profile() },
    });
    (status, jar, Json(body))
}

pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .auth()
        .register(&payload.username, &payload.password, payload.email.as_deref())
        .await?;
    Ok(session_response(&state, jar, StatusCode::CREATED, session))
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .auth()
        .login(&payload.username, &payload.password)
        .await?;
    Ok(session_response(&state, jar, StatusCode::OK, session))
}

pub async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let cleared = Cookie::build((COOKIE_NAME, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.config.environment.is_production())
        .max_age(time::Duration::ZERO)
        .build();
    (jar.add(cleared), Json(json!({ "status": "success" })))
}

pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.auth().forgot_password(&payload.email).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "If an account exists for that email, a reset link has been sent",
    })))
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .auth()
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(session_response(&state, jar, StatusCode::OK, session))
}
