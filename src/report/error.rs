use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use super::repository::RepositoryError;
use crate::ErrorResponse;

/// Ways a report request can fail.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    /// Template or PDF composition failed. `preview` holds the start of the
    /// HTML that was being rendered, whitespace-collapsed.
    #[error("failed to render report: {message}")]
    Rendering { message: String, preview: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ReportError {
    pub fn forbidden() -> Self {
        Self::Forbidden("You are not allowed to generate this report".to_string())
    }

    /// Short machine-readable kind, used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::Forbidden(_) => "Forbidden",
            Self::Rendering { .. } => "InternalRenderingFailure",
            Self::Repository(_) => "InternalServerError",
        }
    }
}

impl ResponseError for ReportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Rendering { .. } | Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::NotFound(message) | Self::Forbidden(message) => message.clone(),
            Self::Rendering { .. } => "Failed to generate the report PDF".to_string(),
            Self::Repository(_) => "Failed to load report data".to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.kind(), &message))
    }
}
