//! Task operations.
//!
//! Each operation pairs a static [`Operation`] declaration (parameter shape
//! and required permissions) with an async function that runs after the
//! request pipeline has approved the call. The functions only talk to the
//! data layer through [`DataAccessPort`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::aggregator::{assemble_task_detail, decode_rows, decode_templates};
use crate::domain::{
    Priority, RecurrenceConfig, RecurrenceKind, TaskCreated, TaskDetail, TaskStatus, TaskSummary,
    TaskTemplate,
};
use crate::error::ServiceError;
use crate::infrastructure::{
    DataAccessError, DataAccessPort, ExpectedReturn, RoutineCall, routines,
};
use crate::pipeline::{
    Credential, FieldDefault, FieldKind, FieldSpec, Operation, Permission, SecurityRule, Shape,
    TASK,
};

// =============================================================================
// Shapes
// =============================================================================

const MAX_RECURRENCE_INTERVAL: i64 = 4_294_967_295;

const TAG_ITEM: FieldKind = FieldKind::Text { min: 2, max: 20 };
const SUBTASK_ITEM: FieldKind = FieldKind::Text { min: 3, max: 100 };

const fn code(coerce: bool) -> FieldKind {
    FieldKind::Integer {
        min: 0,
        max: 2,
        coerce,
    }
}

const RECURRENCE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("type", FieldKind::Choice(RecurrenceKind::NAMES)),
    FieldSpec::required(
        "interval",
        FieldKind::Integer {
            min: 1,
            max: MAX_RECURRENCE_INTERVAL,
            coerce: false,
        },
    ),
    FieldSpec::optional(
        "endDate",
        FieldKind::Date {
            not_before_today: false,
        },
    ),
];

const CREATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("title", FieldKind::Text { min: 3, max: 100 }),
    FieldSpec::optional("description", FieldKind::Text { min: 0, max: 1000 }),
    FieldSpec::optional(
        "dueDate",
        FieldKind::Date {
            not_before_today: true,
        },
    ),
    FieldSpec::optional("priority", code(false)).with_default(FieldDefault::Integer(1)),
    FieldSpec::optional("status", code(false)).with_default(FieldDefault::Integer(0)),
    FieldSpec::optional(
        "recurrenceConfig",
        FieldKind::Object(Shape::new(RECURRENCE_FIELDS)),
    ),
    FieldSpec::optional(
        "estimatedHours",
        FieldKind::Integer {
            min: 0,
            max: 999,
            coerce: false,
        },
    ),
    FieldSpec::optional(
        "estimatedMinutes",
        FieldKind::Integer {
            min: 0,
            max: 59,
            coerce: false,
        },
    ),
    FieldSpec::optional(
        "tags",
        FieldKind::List {
            item: &TAG_ITEM,
            max_items: 5,
        },
    ),
    FieldSpec::optional(
        "subtasks",
        FieldKind::List {
            item: &SUBTASK_ITEM,
            max_items: 20,
        },
    ),
];

const LIST_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("status", code(true)),
    FieldSpec::optional("priority", code(true)),
    FieldSpec::optional(
        "dueDateFrom",
        FieldKind::Date {
            not_before_today: false,
        },
    ),
    FieldSpec::optional(
        "dueDateTo",
        FieldKind::Date {
            not_before_today: false,
        },
    ),
];

const GET_FIELDS: &[FieldSpec] = &[FieldSpec::required(
    "id",
    FieldKind::Integer {
        min: 1,
        max: i64::MAX,
        coerce: true,
    },
)];

// =============================================================================
// Operations
// =============================================================================

const CREATE_RULES: &[SecurityRule] = &[SecurityRule::new(TASK, Permission::Create)];
const READ_RULES: &[SecurityRule] = &[SecurityRule::new(TASK, Permission::Read)];

/// `POST /task`
pub const CREATE_TASK: Operation =
    Operation::new("task_create", Shape::new(CREATE_FIELDS), CREATE_RULES);

/// `GET /task`
pub const LIST_TASKS: Operation = Operation::new("task_list", Shape::new(LIST_FIELDS), READ_RULES);

/// `GET /task/{id}`
pub const GET_TASK: Operation = Operation::new("task_get", Shape::new(GET_FIELDS), READ_RULES);

/// `GET /task-template`
pub const LIST_TEMPLATES: Operation =
    Operation::new("task_template_list", Shape::EMPTY, READ_RULES);

// =============================================================================
// Parameters
// =============================================================================

/// Validated input of [`task_create`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskParams {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub recurrence_config: Option<RecurrenceConfig>,
    pub estimated_hours: Option<u16>,
    pub estimated_minutes: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub subtasks: Option<Vec<String>>,
}

/// Validated filters of [`task_list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTaskParams {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
}

/// Validated input of [`task_get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GetTaskParams {
    pub id: i64,
}

/// Operations without parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NoParams {}

// =============================================================================
// Helpers
// =============================================================================

fn date_input(date: Option<NaiveDate>) -> Value {
    date.map(|date| date.format("%Y-%m-%d").to_string()).into()
}

/// Serializes an optional list to JSON text, or `null` when absent.
fn json_text<T: Serialize>(value: Option<&T>) -> Result<Value, ServiceError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map(Value::from)
        .map_err(ServiceError::generic)
}

fn routine_failure(
    routine: &str,
    error: DataAccessError,
    business_rule: fn(String) -> ServiceError,
) -> ServiceError {
    match error {
        DataAccessError::BusinessRule { message } => {
            tracing::info!(routine, %message, "Routine rejected by business rule");
            business_rule(message)
        }
        other => ServiceError::generic(format!("{routine}: {other}")),
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Creates a task with its tags and subtasks in one routine call.
///
/// # Errors
///
/// - [`ServiceError::BusinessRule`] when the routine rejects the task
/// - [`ServiceError::Generic`] for any other failure, including a missing id
pub async fn task_create(
    data_access: &dyn DataAccessPort,
    credential: &Credential,
    params: CreateTaskParams,
) -> Result<TaskCreated, ServiceError> {
    let call = RoutineCall::new(routines::TASK_CREATE, ExpectedReturn::Single)
        .input("idAccount", credential.id_account)
        .input("idUser", credential.id_user)
        .input("title", params.title)
        .input("description", params.description.unwrap_or_default())
        .input("dueDate", date_input(params.due_date))
        .input("priority", params.priority.value())
        .input("status", params.status.value())
        .input(
            "recurrenceConfig",
            params.recurrence_config.as_ref().map(RecurrenceConfig::encode),
        )
        .input("estimatedHours", params.estimated_hours)
        .input("estimatedMinutes", params.estimated_minutes)
        .input("tags", json_text(params.tags.as_ref())?)
        .input("subtasks", json_text(params.subtasks.as_ref())?);

    let record = data_access
        .execute(call)
        .await
        .and_then(|output| output.into_single())
        .map_err(|error| routine_failure(routines::TASK_CREATE, error, ServiceError::BusinessRule))?
        .ok_or_else(|| ServiceError::generic("task_create returned no row"))?;

    let created: TaskCreated = serde_json::from_value(Value::Object(record))
        .map_err(|error| ServiceError::generic(format!("task_create row: {error}")))?;
    if !created.id_task.is_assigned() {
        return Err(ServiceError::generic(format!(
            "task_create returned id {}",
            created.id_task
        )));
    }

    tracing::info!(id_task = %created.id_task, account = credential.id_account, "Task created");
    Ok(created)
}

/// Lists the caller's tasks, newest first.
///
/// # Errors
///
/// Returns [`ServiceError::Generic`] when the routine fails or returns
/// undecodable rows.
pub async fn task_list(
    data_access: &dyn DataAccessPort,
    credential: &Credential,
    params: ListTaskParams,
) -> Result<Vec<TaskSummary>, ServiceError> {
    let call = RoutineCall::new(routines::TASK_LIST, ExpectedReturn::Rows)
        .input("idAccount", credential.id_account)
        .input("idUser", credential.id_user)
        .input("status", params.status.map(TaskStatus::value))
        .input("priority", params.priority.map(Priority::value))
        .input("dueDateFrom", date_input(params.due_date_from))
        .input("dueDateTo", date_input(params.due_date_to));

    let rows = data_access
        .execute(call)
        .await
        .and_then(|output| output.into_rows())
        .map_err(|error| routine_failure(routines::TASK_LIST, error, ServiceError::BusinessRule))?;

    decode_rows("tasks", rows).map_err(ServiceError::generic)
}

/// Loads a task together with its tags, attachments and subtasks.
///
/// # Errors
///
/// - [`ServiceError::NotFound`] when no task matches, or the routine rejects
///   the lookup
/// - [`ServiceError::Generic`] when the fragments are malformed
pub async fn task_get(
    data_access: &dyn DataAccessPort,
    credential: &Credential,
    params: GetTaskParams,
) -> Result<TaskDetail, ServiceError> {
    let call = RoutineCall::new(
        routines::TASK_GET,
        ExpectedReturn::Fragments(routines::TASK_GET_FRAGMENTS),
    )
    .input("idAccount", credential.id_account)
    .input("idTask", params.id);

    let fragments = data_access
        .execute(call)
        .await
        .and_then(|output| output.into_fragments())
        .map_err(|error| routine_failure(routines::TASK_GET, error, ServiceError::NotFound))?;

    assemble_task_detail(fragments)
        .map_err(ServiceError::generic)?
        .ok_or_else(|| ServiceError::NotFound(format!("Task {} not found", params.id)))
}

/// Lists the task templates available to the caller's account.
///
/// # Errors
///
/// Returns [`ServiceError::Generic`] when the routine fails or a stored
/// payload cannot be decoded.
pub async fn task_template_list(
    data_access: &dyn DataAccessPort,
    credential: &Credential,
) -> Result<Vec<TaskTemplate>, ServiceError> {
    let call = RoutineCall::new(routines::TASK_TEMPLATE_LIST, ExpectedReturn::Rows)
        .input("idAccount", credential.id_account);

    let rows = data_access
        .execute(call)
        .await
        .and_then(|output| output.into_rows())
        .map_err(|error| {
            routine_failure(routines::TASK_TEMPLATE_LIST, error, ServiceError::BusinessRule)
        })?;

    decode_templates(rows).map_err(ServiceError::generic)
}

// =============================================================================
// Tests
// =============================================================================
