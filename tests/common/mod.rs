//! Common test helpers for integration tests.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because Rust compiles each
//! integration test file as a separate crate, and not every file uses every
//! helper.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use futures::FutureExt;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use task_management_api::api::{AppState, create_router};
use task_management_api::infrastructure::{
    DataAccessError, DataAccessPort, InMemoryDataAccess, Record, RoutineCall, RoutineOutput,
};
use task_management_api::pipeline::{HeaderCredentialResolver, RequestOrchestrator};

pub const ACCOUNT_ID: i64 = 7;
pub const USER_ID: i64 = 11;
pub const ALL_TASK_PERMISSIONS: &str = "TASK:CREATE,TASK:READ,TASK:UPDATE,TASK:DELETE";

type Script = dyn Fn(&RoutineCall) -> Result<RoutineOutput, DataAccessError> + Send + Sync;

// =============================================================================
// Recording Data Access
// =============================================================================

/// Fake data layer that answers from a script and records every call.
pub struct RecordingStore {
    script: Box<Script>,
    calls: Mutex<Vec<RoutineCall>>,
}

impl RecordingStore {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&RoutineCall) -> Result<RoutineOutput, DataAccessError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A store that must never be reached.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|call| {
            Err(DataAccessError::Database(format!(
                "unexpected routine call: {}",
                call.routine
            )))
        })
    }

    pub fn calls(&self) -> Vec<RoutineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DataAccessPort for RecordingStore {
    fn execute(&self, call: RoutineCall) -> BoxFuture<'_, Result<RoutineOutput, DataAccessError>> {
        let answer = (self.script)(&call);
        self.calls.lock().unwrap().push(call);
        async move { answer }.boxed()
    }
}

// =============================================================================
// Application Helpers
// =============================================================================

/// Builds the router over `data_access` with header-based credentials.
pub fn app_with(data_access: Arc<dyn DataAccessPort>) -> Router {
    let orchestrator = RequestOrchestrator::new(Arc::new(HeaderCredentialResolver));
    create_router(AppState::new(orchestrator, data_access))
}

/// Builds the router over a fresh in-memory store with default templates.
pub fn in_memory_app() -> Router {
    app_with(Arc::new(InMemoryDataAccess::with_default_templates()))
}

/// Builds a request carrying the standard identity headers.
///
/// `permissions` of `None` omits the permissions header entirely.
pub fn request(
    method: Method,
    uri: &str,
    permissions: Option<&str>,
    body: Option<&Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-account-id", ACCOUNT_ID.to_string())
        .header("x-user-id", USER_ID.to_string());
    if let Some(permissions) = permissions {
        builder = builder.header("x-permissions", permissions);
    }

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends one request and returns the status and the JSON body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

/// A stored task row as the task routines emit it.
pub fn task_row(id_task: i64, title: &str) -> Record {
    record(serde_json::json!({
        "idTask": id_task,
        "idAccount": ACCOUNT_ID,
        "idUser": USER_ID,
        "title": title,
        "description": "",
        "dueDate": null,
        "priority": 1,
        "status": 0,
        "recurrenceConfig": null,
        "estimatedHours": null,
        "estimatedMinutes": null,
        "dateCreated": "2026-01-05T10:00:00Z",
        "dateModified": "2026-01-05T10:00:00Z"
    }))
}
