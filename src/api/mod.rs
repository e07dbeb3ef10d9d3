//! API module for HTTP handlers.
//!
//! This module contains route definitions, request handlers and the response
//! envelope.

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod routes;

pub use envelope::{Envelope, ErrorBody, Metadata};
pub use handlers::{
    AppState, HealthResponse, create_task, get_task, health_check, list_task_templates,
    list_tasks,
};
pub use routes::{INTERNAL_PREFIX, create_router};
