//! HTTP rendering of [`ServiceError`].

use axum::{
    Json,
    response::{IntoResponse, Response},
};

use super::envelope::Envelope;
use crate::error::ServiceError;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::Validation(error) => Some(error.errors.clone()),
            Self::Generic(detail) => {
                // Internal errors never expose details to clients.
                tracing::error!(%detail, "Request failed");
                None
            }
            _ => None,
        };

        let envelope: Envelope<()> =
            Envelope::failure(self.error_code(), self.public_message(), details);
        (status, Json(envelope)).into_response()
    }
}
