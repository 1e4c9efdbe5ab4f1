//! Unified error types for the package import service
//!
//! This module defines error types for each layer:
//! - `DomainError`: Core business logic errors, each with a stable code
//! - `GiteaError`: Gitea API client errors
//! - `MailError`: Email transport errors
//! - `AppError`: Application layer errors (wraps domain errors for HTTP responses)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Domain layer errors - pure business logic errors
///
/// Aggregate methods return these before touching any state, so a caller
/// that receives one must not persist.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Not the importer: {0}")]
    NotImporter(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Concurrent update: {0}")]
    ConcurrentUpdate(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("CI is running")]
    CiIsRunning,

    #[error("CI has passed")]
    CiIsPassed,

    #[error("CI result does not match the current run")]
    CiIsUnmatched,

    #[error("Not time to retest CI yet")]
    CiNotTimeYet,

    #[error("Check items not passed: {0}")]
    CheckItemsNotPassed(String),

    #[error("{op} failed: {message}")]
    External { op: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Wrap a collaborator failure with the operation that produced it
    pub fn external(op: &'static str, err: impl std::fmt::Display) -> Self {
        DomainError::External {
            op,
            message: err.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "invalid_param",
            DomainError::InvalidPhase(_) => "invalid_phase",
            DomainError::NotImporter(_) => "not_importer",
            DomainError::Unauthorized(_) => "not_authorized",
            DomainError::ConcurrentUpdate(_) => "concurrent_update",
            DomainError::AlreadyExists(_) => "already_exists",
            DomainError::NotFound(_) => "not_found",
            DomainError::CiIsRunning => "ci_is_running",
            DomainError::CiIsPassed => "ci_is_passed",
            DomainError::CiIsUnmatched => "ci_is_unmatched",
            DomainError::CiNotTimeYet => "ci_not_time_yet",
            DomainError::CheckItemsNotPassed(_) => "check_items_not_passed",
            DomainError::External { .. } => "external_error",
            DomainError::Database(_) => "database_error",
            DomainError::Internal(_) => "internal_error",
        }
    }

    pub fn is_concurrent_update(&self) -> bool {
        matches!(self, DomainError::ConcurrentUpdate(_))
    }
}

/// Gitea API client errors
#[derive(Debug, Error)]
pub enum GiteaError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Repository not found: {owner}/{repo}")]
    RepoNotFound { owner: String, repo: String },

    #[error("Pull request not found: {owner}/{repo}#{number}")]
    PullRequestNotFound {
        owner: String,
        repo: String,
        number: i64,
    },

    #[error("Rate limited")]
    RateLimited,

    #[error("Unauthorized - invalid token")]
    Unauthorized,

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl GiteaError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GiteaError::RepoNotFound { .. }
                | GiteaError::PullRequestNotFound { .. }
                | GiteaError::Api { status: 404, .. }
        )
    }
}

impl From<GiteaError> for DomainError {
    fn from(e: GiteaError) -> Self {
        DomainError::external("gitea", e)
    }
}

/// Email transport errors
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid SMTP configuration: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

impl From<MailError> for DomainError {
    fn from(e: MailError) -> Self {
        DomainError::external("email", e)
    }
}

/// Application layer errors - used by HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,
}

/// Error response body for JSON responses
#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error, details) = match &self {
            AppError::Domain(e) => {
                let status = match e {
                    DomainError::Validation(_)
                    | DomainError::InvalidPhase(_)
                    | DomainError::CiIsRunning
                    | DomainError::CiIsPassed
                    | DomainError::CiIsUnmatched
                    | DomainError::CiNotTimeYet
                    | DomainError::CheckItemsNotPassed(_) => StatusCode::BAD_REQUEST,
                    DomainError::NotImporter(_) | DomainError::Unauthorized(_) => {
                        StatusCode::FORBIDDEN
                    }
                    DomainError::ConcurrentUpdate(_) | DomainError::AlreadyExists(_) => {
                        StatusCode::CONFLICT
                    }
                    DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                    DomainError::External { .. }
                    | DomainError::Database(_)
                    | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };

                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(code = e.code(), "Internal error: {}", e);
                    (status, e.code(), "Internal server error", None)
                } else {
                    (status, e.code(), "Request rejected", Some(e.to_string()))
                }
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Bad request",
                Some(msg.clone()),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized",
                None,
            ),
        };

        let body = Json(ErrorResponse {
            code,
            error: error.to_string(),
            details,
        });

        (status, body).into_response()
    }
}
