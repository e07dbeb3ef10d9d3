//! Service error taxonomy.
//!
//! Every failure a request can end in is one [`ServiceError`] variant. The
//! HTTP mapping lives in `api::error`.

use axum::http::StatusCode;
use thiserror::Error;

use crate::pipeline::{AuthorizationError, CredentialError, ValidationError};

/// Fixed message returned for every generic failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred";

/// Failure of a request at any stage of the pipeline.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input does not conform to the declared shape.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// No credential could be resolved for the caller.
    #[error("{0}")]
    Unauthenticated(#[from] CredentialError),

    /// The credential lacks a required permission.
    #[error("{0}")]
    Forbidden(#[from] AuthorizationError),

    /// The data layer rejected well-formed input for a domain reason.
    #[error("{0}")]
    BusinessRule(String),

    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Anything else. The detail is logged, never returned to the caller.
    #[error("unexpected failure: {0}")]
    Generic(String),
}

impl ServiceError {
    /// Wraps any displayable failure as a generic failure.
    pub fn generic(detail: impl std::fmt::Display) -> Self {
        Self::Generic(detail.to_string())
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BusinessRule(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Generic(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(_) => "Validation failed".to_string(),
            Self::Generic(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
