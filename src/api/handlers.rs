//! HTTP handlers for the task endpoints.
//!
//! Handlers are thin: they collect path, query, body and headers into an
//! [`InboundRequest`], let the [`RequestOrchestrator`] approve it, call one
//! task operation and wrap the result in an [`Envelope`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::HeaderMap,
};

use super::envelope::Envelope;
use crate::domain::{TaskCreated, TaskDetail, TaskSummary, TaskTemplate};
use crate::error::ServiceError;
use crate::infrastructure::DataAccessPort;
use crate::pipeline::{InboundRequest, RequestOrchestrator, Validated};
use crate::service::{
    CREATE_TASK, CreateTaskParams, GET_TASK, GetTaskParams, LIST_TASKS, LIST_TEMPLATES,
    ListTaskParams, NoParams, task_create, task_get, task_list, task_template_list,
};

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// Uses trait objects so the data-access backend and credential resolver can
/// be selected at startup.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: RequestOrchestrator,
    pub data_access: Arc<dyn DataAccessPort>,
}

impl AppState {
    #[must_use]
    pub const fn new(orchestrator: RequestOrchestrator, data_access: Arc<dyn DataAccessPort>) -> Self {
        Self {
            orchestrator,
            data_access,
        }
    }
}

type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;
type PathParams = Result<Path<HashMap<String, String>>, PathRejection>;

/// Adds query parameters, or records them as unreadable so the rejection is
/// rendered in the envelope.
fn with_query(request: InboundRequest, query: QueryParams) -> InboundRequest {
    match query {
        Ok(Query(params)) => request.with_query(params),
        Err(rejection) => request.with_unreadable("query", rejection.body_text()),
    }
}

fn with_path(request: InboundRequest, path: PathParams) -> InboundRequest {
    match path {
        Ok(Path(params)) => request.with_path(params),
        Err(rejection) => request.with_unreadable("path", rejection.body_text()),
    }
}

// =============================================================================
// Task Handlers
// =============================================================================

/// `POST /task`
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for an invalid or unreadable body
/// - 401 `UNAUTHENTICATED` without a resolvable credential
/// - 403 `FORBIDDEN` without `TASK:CREATE`
/// - 400 `BUSINESS_RULE_VIOLATION` when the data layer rejects the task
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryParams,
    body: Bytes,
) -> Result<Json<Envelope<TaskCreated>>, ServiceError> {
    let request = with_query(InboundRequest::new(headers), query).with_body(&body);
    let Validated { credential, params } = state
        .orchestrator
        .authorize::<CreateTaskParams>(&request, &CREATE_TASK)?;

    let created = task_create(state.data_access.as_ref(), &credential, params).await?;

    Ok(Json(Envelope::success(created)))
}

/// `GET /task`
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for out-of-range filters
/// - 401 `UNAUTHENTICATED` without a resolvable credential
/// - 403 `FORBIDDEN` without `TASK:READ`
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryParams,
) -> Result<Json<Envelope<Vec<TaskSummary>>>, ServiceError> {
    let request = with_query(InboundRequest::new(headers), query);
    let Validated { credential, params } = state
        .orchestrator
        .authorize::<ListTaskParams>(&request, &LIST_TASKS)?;

    let tasks = task_list(state.data_access.as_ref(), &credential, params).await?;

    Ok(Json(Envelope::list(tasks)))
}

/// `GET /task/{id}`
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` when `id` is not a positive integer or the path
///   cannot be decoded
/// - 401 `UNAUTHENTICATED` without a resolvable credential
/// - 403 `FORBIDDEN` without `TASK:READ`
/// - 404 `NOT_FOUND` when the task does not exist in the caller's account
pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> Result<Json<Envelope<TaskDetail>>, ServiceError> {
    let request = with_query(with_path(InboundRequest::new(headers), path), query);
    let Validated { credential, params } = state
        .orchestrator
        .authorize::<GetTaskParams>(&request, &GET_TASK)?;

    let detail = task_get(state.data_access.as_ref(), &credential, params).await?;

    Ok(Json(Envelope::success(detail)))
}

/// `GET /task-template`
///
/// # Errors
///
/// - 401 `UNAUTHENTICATED` without a resolvable credential
/// - 403 `FORBIDDEN` without `TASK:READ`
pub async fn list_task_templates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Vec<TaskTemplate>>>, ServiceError> {
    let request = InboundRequest::new(headers);
    let Validated { credential, .. } = state
        .orchestrator
        .authorize::<NoParams>(&request, &LIST_TEMPLATES)?;

    let templates = task_template_list(state.data_access.as_ref(), &credential).await?;

    Ok(Json(Envelope::list(templates)))
}

// =============================================================================
// GET /health Handler
// =============================================================================

/// Health check response body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint for load balancers. Not enveloped, no credential.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
