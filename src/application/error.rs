use std::error::Error as StdError;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::application::pagination::PaginationError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Error chain captured for the response-logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[source] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Translate a storage error, naming the entity for `NotFound`.
    pub fn from_repo(entity: &'static str, error: RepoError) -> Self {
        match error {
            RepoError::NotFound => Self::NotFound { entity },
            RepoError::Duplicate { constraint } => {
                Self::Conflict(format!("{entity} violates unique constraint `{constraint}`"))
            }
            RepoError::Integrity { message } => Self::Conflict(message),
            RepoError::InvalidInput { message } => Self::Validation(message),
            other @ (RepoError::Persistence(_) | RepoError::Timeout) => Self::Storage(other),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Storage(_) => "storage_failure",
            AppError::Infra(_) | AppError::Unexpected(_) => "internal_error",
        }
    }

    fn presentation_message(&self) -> String {
        match self {
            AppError::Validation(message) | AppError::Conflict(message) => message.clone(),
            AppError::NotFound { entity } => format!("{entity} not found"),
            AppError::Storage(_) => "Service temporarily unavailable".to_string(),
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        Self::from_repo("resource", error)
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { message } => Self::Validation(message),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PaginationError> for AppError {
    fn from(error: PaginationError) -> Self {
        Self::Validation(error.to_string())
    }
}

/// Attach an entity name to storage errors on the way up.
pub trait RepoResultExt<T> {
    fn entity(self, entity: &'static str) -> Result<T, AppError>;
}

impl<T> RepoResultExt<T> for Result<T, RepoError> {
    fn entity(self, entity: &'static str) -> Result<T, AppError> {
        self.map_err(|err| AppError::from_repo(entity, err))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Serialize)]
struct ErrorMessage {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorMessage {
                code: self.code(),
                message: self.presentation_message(),
            },
        };
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
