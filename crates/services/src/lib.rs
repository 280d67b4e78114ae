#![forbid(unsafe_code)]

pub mod analytics_service;
pub mod app_services;
pub mod auth_service;
pub mod error;
pub mod export;
pub mod password;
pub mod reset;
pub mod submission_service;
pub mod token;
pub mod user_service;

pub use survey_core::Clock;

pub use analytics_service::AnalyticsService;
pub use app_services::{AppServices, AuthSettings};
pub use auth_service::{AuthService, Session};
pub use error::{
    AnalyticsError, AppServicesError, AuthError, NotifyError, PasswordHashError,
    SubmissionServiceError, TokenError, UserServiceError, ValidationErrors,
};
pub use export::{Export, ExportFormat, UnknownExportFormat};
pub use reset::{LogNotifier, ResetNotifier};
pub use submission_service::SubmissionService;
pub use token::{Claims, TokenKeys};
pub use user_service::{UserPatch, UserService};
