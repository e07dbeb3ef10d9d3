//! Router assembly.

use axum::{
    Router,
    routing::{get, post},
};

use super::handlers::{
    AppState, create_task, get_task, health_check, list_task_templates, list_tasks,
};

/// Prefix under which the task endpoints are mounted.
pub const INTERNAL_PREFIX: &str = "/api/v1/internal";

/// Builds the application router. Middleware layers are added by the caller.
pub fn create_router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/task", post(create_task).get(list_tasks))
        .route("/task/{id}", get(get_task))
        .route("/task-template", get(list_task_templates));

    Router::new()
        .route("/health", get(health_check))
        .nest(INTERNAL_PREFIX, internal)
        .with_state(state)
}
