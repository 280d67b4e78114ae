//! HTTP surface for the survey backend.
//!
//! Everything lives under `/api` apart from `/health`:
//!
//! - `/api/auth` registers, signs in and out, and resets passwords. Sessions
//!   are HS256 tokens carried in an `HttpOnly` `jwt` cookie or a bearer header.
//! - `/api/users` lets a signed-in user read and rename their own account.
//! - `/api/admin` is admin-only: account management plus the submission
//!   listing and CSV/JSON export.
//! - `/api/questionnaire` takes anonymous submissions; its `analytics` report
//!   is admin-only.
//!
//! Every error is rendered as `{"status":"error","message":...}`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, HeaderValue, Method,
        header::{
            ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, ORIGIN, REFERRER_POLICY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
        request::Parts,
    },
    middleware,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod routes;
pub mod state;

use config::Config;
use rate_limit::rate_limit_middleware;
use routes::{admin, auth, health, not_found_handler, questionnaire, users};
use services::AppServices;
use state::AppState;

/// Install the global `tracing` subscriber, honouring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Assemble routes and middleware around `state`.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/api/auth/reset-password", post(auth::reset_password_handler))
        .route("/api/users/me", get(users::me_handler))
        .route("/api/users/update-me", patch(users::update_me_handler))
        .route("/api/admin/users", get(admin::list_users_handler))
        .route(
            "/api/admin/users/{id}",
            get(admin::get_user_handler)
                .patch(admin::update_user_handler)
                .delete(admin::delete_user_handler),
        )
        .route("/api/admin/questionnaires", get(admin::list_submissions_handler))
        .route(
            "/api/admin/questionnaires/export",
            get(admin::export_submissions_handler),
        )
        .route(
            "/api/admin/questionnaires/{id}",
            get(admin::get_submission_handler),
        )
        .route("/api/questionnaire", post(questionnaire::submit_handler))
        .route(
            "/api/questionnaire/analytics",
            get(questionnaire::analytics_handler),
        )
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` matches any run of characters; everything else is literal.
#[must_use]
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = origin.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No wildcard at all.
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

fn cors_layer(allowed: &[String]) -> CorsLayer {
    let allowed: Arc<Vec<String>> = Arc::new(allowed.to_vec());
    let predicate = move |origin: &HeaderValue, _parts: &Parts| {
        let allowed_origin = origin
            .to_str()
            .is_ok_and(|o| allowed.iter().any(|pattern| origin_matches(pattern, o)));
        if !allowed_origin {
            warn!(?origin, "CORS blocked origin");
        }
        allowed_origin
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(predicate))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            CACHE_CONTROL,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

/// Bind, serve until Ctrl+C / SIGTERM, then drain.
///
/// # Errors
///
/// Returns the I/O error from binding or serving.
pub async fn start_server(config: Config, services: AppServices) -> std::io::Result<()> {
    let address = format!("0.0.0.0:{}", config.port);
    info!(environment = config.environment.as_str(), "Starting server...");
    let app = build_router(AppState::new(services, config));

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
