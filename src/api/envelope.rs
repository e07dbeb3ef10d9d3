//! Uniform response envelope.
//!
//! Every endpoint except the health check answers with one of two shapes:
//!
//! ```json
//! { "success": true, "data": ..., "metadata": { "timestamp": "..." } }
//! { "success": false, "error": { "code": "...", "message": "...", "details": [...] }, "timestamp": "..." }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::FieldError;

/// Extra information attached to a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Metadata {
    #[must_use]
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            count: None,
        }
    }

    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Either a success or a failure body, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Success {
        success: bool,
        data: T,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Failure {
        success: bool,
        error: ErrorBody,
        timestamp: DateTime<Utc>,
    },
}

impl<T> Envelope<T> {
    /// Wraps `data` without metadata.
    #[must_use]
    pub const fn success(data: T) -> Self {
        Self::Success {
            success: true,
            data,
            metadata: None,
        }
    }

    #[must_use]
    pub const fn success_with(data: T, metadata: Metadata) -> Self {
        Self::Success {
            success: true,
            data,
            metadata: Some(metadata),
        }
    }

    #[must_use]
    pub fn failure(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<Vec<FieldError>>,
    ) -> Self {
        Self::Failure {
            success: false,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details,
            },
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl<T> Envelope<Vec<T>> {
    /// Wraps a list and records its length in the metadata.
    #[must_use]
    pub fn list(items: Vec<T>) -> Self {
        let count = items.len();
        Self::success_with(items, Metadata::now().with_count(count))
    }
}
