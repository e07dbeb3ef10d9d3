//! In-memory data access.
//!
//! Implements the task routines over in-process tables so the service can run
//! without a database. Suitable for development and tests.
//!
//! # Features
//!
//! - Same inputs, outputs and result-set order as the database routines
//! - Raises the business-rule sentinel for inconsistent recurrence end dates
//! - Thread-safe with `Arc<RwLock<...>>`

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::data_access::{
    DataAccessError, DataAccessPort, ExpectedReturn, Record, RoutineCall, RoutineOutput, routines,
};
use crate::domain::{Priority, RecurrenceConfig, TaskStatus, TemplatePayload};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskRow {
    id_task: i64,
    id_account: i64,
    id_user: i64,
    title: String,
    description: String,
    due_date: Option<NaiveDate>,
    priority: Priority,
    status: TaskStatus,
    recurrence_config: Option<String>,
    estimated_hours: Option<u16>,
    estimated_minutes: Option<u8>,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubtaskRow {
    #[serde(skip)]
    id_task: i64,
    id_subtask: i64,
    title: String,
    status: TaskStatus,
    sort_order: i32,
    date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentRow {
    #[serde(skip)]
    id_task: i64,
    id_attachment: i64,
    file_name: String,
    file_size: i64,
    file_type: String,
    file_path: String,
    date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateRow {
    id_template: i64,
    name: String,
    template_data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRow<'a> {
    id_task: i64,
    title: &'a str,
    description: &'a str,
    due_date: Option<NaiveDate>,
    priority: Priority,
    status: TaskStatus,
    estimated_hours: Option<u16>,
    estimated_minutes: Option<u8>,
    tag_count: usize,
    subtask_count: usize,
    completed_subtask_count: usize,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    last_task_id: i64,
    last_subtask_id: i64,
    last_attachment_id: i64,
    tasks: Vec<TaskRow>,
    tags: Vec<(i64, String)>,
    subtasks: Vec<SubtaskRow>,
    attachments: Vec<AttachmentRow>,
    templates: Vec<TemplateRow>,
}

// =============================================================================
// Routine Inputs
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInput {
    id_account: i64,
    id_user: i64,
    title: String,
    #[serde(default)]
    description: String,
    due_date: Option<NaiveDate>,
    priority: Priority,
    status: TaskStatus,
    recurrence_config: Option<String>,
    estimated_hours: Option<u16>,
    estimated_minutes: Option<u8>,
    tags: Option<String>,
    subtasks: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInput {
    id_account: i64,
    id_user: i64,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    due_date_from: Option<NaiveDate>,
    due_date_to: Option<NaiveDate>,
}

impl ListInput {
    fn matches(&self, task: &TaskRow) -> bool {
        let due_in_range = match (self.due_date_from, self.due_date_to, task.due_date) {
            (None, None, _) => true,
            (_, _, None) => false,
            (from, to, Some(due)) => {
                from.is_none_or(|from| due >= from) && to.is_none_or(|to| due <= to)
            }
        };

        task.id_account == self.id_account
            && task.id_user == self.id_user
            && self.status.is_none_or(|status| task.status == status)
            && self.priority.is_none_or(|priority| task.priority == priority)
            && due_in_range
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetInput {
    id_account: i64,
    id_task: i64,
}

fn parse_input<T: DeserializeOwned>(routine: &str, inputs: Record) -> Result<T, DataAccessError> {
    serde_json::from_value(Value::Object(inputs))
        .map_err(|error| DataAccessError::Database(format!("invalid input for {routine}: {error}")))
}

fn parse_text_list(name: &str, text: Option<&str>) -> Result<Vec<String>, DataAccessError> {
    text.map_or_else(
        || Ok(Vec::new()),
        |text| {
            serde_json::from_str(text)
                .map_err(|error| DataAccessError::Database(format!("invalid {name}: {error}")))
        },
    )
}

fn to_record<T: Serialize>(row: &T) -> Result<Record, DataAccessError> {
    match serde_json::to_value(row) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(DataAccessError::Malformed(format!(
            "row serialized to non-object: {other}"
        ))),
        Err(error) => Err(DataAccessError::Malformed(error.to_string())),
    }
}

fn to_records<'a, T: Serialize + 'a>(
    rows: impl IntoIterator<Item = &'a T>,
) -> Result<Vec<Record>, DataAccessError> {
    rows.into_iter().map(to_record).collect()
}

/// Reports the business-rule violation a recurrence end date can cause.
fn recurrence_violation(
    recurrence: &RecurrenceConfig,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<String> {
    let end_date = recurrence.end_date?;
    match due_date {
        Some(due_date) if end_date < due_date => {
            Some("Recurrence end date cannot precede the due date".to_string())
        }
        None if end_date < today => {
            Some("Recurrence end date cannot be in the past".to_string())
        }
        _ => None,
    }
}

// =============================================================================
// In-Memory Data Access
// =============================================================================

/// A new attachment row for [`InMemoryDataAccess::attach_file`].
#[derive(Debug, Clone)]
pub struct AttachmentSeed {
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub file_path: String,
}

/// In-memory implementation of [`DataAccessPort`].
///
/// # Example
///
/// ```ignore
/// let store = InMemoryDataAccess::with_default_templates();
/// let output = store.execute(call).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataAccess {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDataAccess {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given templates, in order.
    #[must_use]
    pub fn with_templates(templates: impl IntoIterator<Item = (String, TemplatePayload)>) -> Self {
        let templates = templates
            .into_iter()
            .zip(1_i64..)
            .map(|((name, payload), id_template)| TemplateRow {
                id_template,
                name,
                template_data: payload.encode(),
            })
            .collect();

        Self {
            tables: Arc::new(RwLock::new(Tables {
                templates,
                ..Tables::default()
            })),
        }
    }

    /// Creates a store seeded with a small set of everyday templates.
    #[must_use]
    pub fn with_default_templates() -> Self {
        Self::with_templates([
            (
                "Weekly review".to_string(),
                TemplatePayload {
                    title: "Weekly review".to_string(),
                    description: Some("Review last week and plan the next one".to_string()),
                    priority: Some(Priority::Medium),
                    estimated_hours: Some(1),
                    estimated_minutes: Some(0),
                    tags: Some(vec!["planning".to_string()]),
                },
            ),
            (
                "Bug triage".to_string(),
                TemplatePayload {
                    title: "Bug triage".to_string(),
                    description: None,
                    priority: Some(Priority::High),
                    estimated_hours: None,
                    estimated_minutes: Some(30),
                    tags: Some(vec!["bugs".to_string(), "team".to_string()]),
                },
            ),
            (
                "Grocery run".to_string(),
                TemplatePayload {
                    title: "Grocery run".to_string(),
                    description: None,
                    priority: Some(Priority::Low),
                    estimated_hours: None,
                    estimated_minutes: None,
                    tags: Some(vec!["home".to_string()]),
                },
            ),
        ])
    }

    /// Attaches a file to an existing task and returns the attachment id.
    ///
    /// Returns `None` when the task does not exist.
    pub async fn attach_file(&self, id_task: i64, seed: AttachmentSeed) -> Option<i64> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.iter().any(|task| task.id_task == id_task) {
            return None;
        }

        tables.last_attachment_id += 1;
        let id_attachment = tables.last_attachment_id;
        tables.attachments.push(AttachmentRow {
            id_task,
            id_attachment,
            file_name: seed.file_name,
            file_size: seed.file_size,
            file_type: seed.file_type,
            file_path: seed.file_path,
            date_created: Utc::now(),
        });
        Some(id_attachment)
    }

    async fn task_create(&self, inputs: Record) -> Result<Vec<Vec<Record>>, DataAccessError> {
        let input: CreateInput = parse_input(routines::TASK_CREATE, inputs)?;

        if let Some(text) = input.recurrence_config.as_deref() {
            let recurrence = RecurrenceConfig::decode(text).map_err(|error| {
                DataAccessError::Database(format!("invalid recurrenceConfig: {error}"))
            })?;
            if let Some(message) =
                recurrence_violation(&recurrence, input.due_date, Utc::now().date_naive())
            {
                return Err(DataAccessError::BusinessRule { message });
            }
        }
        let tags = parse_text_list("tags", input.tags.as_deref())?;
        let subtasks = parse_text_list("subtasks", input.subtasks.as_deref())?;

        let now = Utc::now();
        let mut tables = self.tables.write().await;
        tables.last_task_id += 1;
        let id_task = tables.last_task_id;

        tables.tasks.push(TaskRow {
            id_task,
            id_account: input.id_account,
            id_user: input.id_user,
            title: input.title,
            description: input.description,
            due_date: input.due_date,
            priority: input.priority,
            status: input.status,
            recurrence_config: input.recurrence_config,
            estimated_hours: input.estimated_hours,
            estimated_minutes: input.estimated_minutes,
            date_created: now,
            date_modified: now,
        });
        tables
            .tags
            .extend(tags.into_iter().map(|tag| (id_task, tag)));
        for (sort_order, title) in (0_i32..).zip(subtasks) {
            tables.last_subtask_id += 1;
            let id_subtask = tables.last_subtask_id;
            tables.subtasks.push(SubtaskRow {
                id_task,
                id_subtask,
                title,
                status: TaskStatus::Pending,
                sort_order,
                date_created: now,
            });
        }
        drop(tables);

        let mut created = Record::new();
        created.insert("idTask".to_string(), Value::from(id_task));
        Ok(vec![vec![created]])
    }

    async fn task_list(&self, inputs: Record) -> Result<Vec<Vec<Record>>, DataAccessError> {
        let filter: ListInput = parse_input(routines::TASK_LIST, inputs)?;
        let tables = self.tables.read().await;

        let mut matching: Vec<&TaskRow> = tables
            .tasks
            .iter()
            .filter(|task| filter.matches(task))
            .collect();
        matching.sort_by(|left, right| {
            right
                .date_created
                .cmp(&left.date_created)
                .then(right.id_task.cmp(&left.id_task))
        });

        let rows = matching
            .into_iter()
            .map(|task| {
                let subtasks = tables
                    .subtasks
                    .iter()
                    .filter(|subtask| subtask.id_task == task.id_task);
                to_record(&SummaryRow {
                    id_task: task.id_task,
                    title: &task.title,
                    description: &task.description,
                    due_date: task.due_date,
                    priority: task.priority,
                    status: task.status,
                    estimated_hours: task.estimated_hours,
                    estimated_minutes: task.estimated_minutes,
                    tag_count: tables
                        .tags
                        .iter()
                        .filter(|(id_task, _)| *id_task == task.id_task)
                        .count(),
                    subtask_count: subtasks.clone().count(),
                    completed_subtask_count: subtasks
                        .filter(|subtask| subtask.status.is_completed())
                        .count(),
                    date_created: task.date_created,
                    date_modified: task.date_modified,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vec![rows])
    }

    async fn task_get(&self, inputs: Record) -> Result<Vec<Vec<Record>>, DataAccessError> {
        let key: GetInput = parse_input(routines::TASK_GET, inputs)?;
        let tables = self.tables.read().await;

        let Some(task) = tables
            .tasks
            .iter()
            .find(|task| task.id_task == key.id_task && task.id_account == key.id_account)
        else {
            return Ok(vec![Vec::new(), Vec::new(), Vec::new(), Vec::new()]);
        };

        let tags = tables
            .tags
            .iter()
            .filter(|(id_task, _)| *id_task == task.id_task)
            .map(|(_, tag)| {
                let mut row = Record::new();
                row.insert("tag".to_string(), Value::from(tag.as_str()));
                row
            })
            .collect();

        let attachments = to_records(
            tables
                .attachments
                .iter()
                .filter(|attachment| attachment.id_task == task.id_task),
        )?;

        let mut subtasks: Vec<&SubtaskRow> = tables
            .subtasks
            .iter()
            .filter(|subtask| subtask.id_task == task.id_task)
            .collect();
        subtasks.sort_by_key(|subtask| (subtask.sort_order, subtask.id_subtask));

        Ok(vec![
            vec![to_record(task)?],
            tags,
            attachments,
            to_records(subtasks)?,
        ])
    }

    async fn task_template_list(&self) -> Result<Vec<Vec<Record>>, DataAccessError> {
        let tables = self.tables.read().await;
        Ok(vec![to_records(&tables.templates)?])
    }
}

impl DataAccessPort for InMemoryDataAccess {
    fn execute(&self, call: RoutineCall) -> BoxFuture<'_, Result<RoutineOutput, DataAccessError>> {
        async move {
            let RoutineCall {
                routine,
                inputs,
                expected,
            } = call;
            tracing::debug!(routine, "Executing in-memory routine");

            let result_sets = match routine {
                routines::TASK_CREATE => self.task_create(inputs).await?,
                routines::TASK_LIST => self.task_list(inputs).await?,
                routines::TASK_GET => self.task_get(inputs).await?,
                routines::TASK_TEMPLATE_LIST => self.task_template_list().await?,
                unknown => {
                    return Err(DataAccessError::Database(format!(
                        "unknown routine: {unknown}"
                    )));
                }
            };

            if expected == ExpectedReturn::None {
                return Ok(RoutineOutput::None);
            }
            RoutineOutput::from_result_sets(expected, result_sets)
        }
        .boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================
