//! Reassembly of routine output into domain views.
//!
//! A task lookup produces four named fragments. This module binds each one to
//! its field of [`TaskDetail`] by name, projects tag rows to plain strings and
//! decodes the recurrence configuration stored as text.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    Priority, RecurrenceConfig, RecurrenceDecodeError, Task, TaskDetail, TaskId, TaskStatus,
    TaskTemplate, TemplateDecodeError, TemplatePayload,
};
use crate::infrastructure::{NamedFragments, Record};

/// Routine output that cannot be turned into the expected view.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("missing result fragment: {0}")]
    MissingFragment(&'static str),

    #[error("invalid row in {fragment}: {reason}")]
    InvalidRow {
        fragment: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Recurrence(#[from] RecurrenceDecodeError),

    #[error(transparent)]
    Template(#[from] TemplateDecodeError),
}

/// Task row as stored: recurrence is still serialized text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTaskRow {
    id_task: TaskId,
    id_account: i64,
    id_user: i64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    due_date: Option<NaiveDate>,
    priority: Priority,
    status: TaskStatus,
    #[serde(default)]
    recurrence_config: Option<String>,
    estimated_hours: Option<u16>,
    estimated_minutes: Option<u8>,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
}

impl StoredTaskRow {
    fn into_task(self) -> Result<Task, AggregationError> {
        let recurrence_config = self
            .recurrence_config
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(RecurrenceConfig::decode)
            .transpose()?;

        Ok(Task {
            id_task: self.id_task,
            id_account: self.id_account,
            id_user: self.id_user,
            title: self.title,
            description: self.description.unwrap_or_default(),
            due_date: self.due_date,
            priority: self.priority,
            status: self.status,
            recurrence_config,
            estimated_hours: self.estimated_hours,
            estimated_minutes: self.estimated_minutes,
            date_created: self.date_created,
            date_modified: self.date_modified,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTemplateRow {
    id_template: i64,
    name: String,
    template_data: String,
}

fn decode_row<T: DeserializeOwned>(
    fragment: &'static str,
    row: Record,
) -> Result<T, AggregationError> {
    serde_json::from_value(Value::Object(row)).map_err(|error| AggregationError::InvalidRow {
        fragment,
        reason: error.to_string(),
    })
}

/// Decodes every row of a fragment into `T`.
///
/// # Errors
///
/// Returns [`AggregationError::InvalidRow`] for the first row that does not fit.
pub fn decode_rows<T: DeserializeOwned>(
    fragment: &'static str,
    rows: Vec<Record>,
) -> Result<Vec<T>, AggregationError> {
    rows.into_iter().map(|row| decode_row(fragment, row)).collect()
}

fn take(
    fragments: &mut NamedFragments,
    name: &'static str,
) -> Result<Vec<Record>, AggregationError> {
    fragments
        .take(name)
        .ok_or(AggregationError::MissingFragment(name))
}

fn project_tag(row: &Record) -> Result<String, AggregationError> {
    row.get("tag")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AggregationError::InvalidRow {
            fragment: "tags",
            reason: "row has no 'tag' text".to_string(),
        })
}

/// Assembles the task detail view from the `task_get` fragments.
///
/// Returns `Ok(None)` when the task fragment is empty, whatever the other
/// fragments hold. Extra rows in the task fragment are ignored.
///
/// # Errors
///
/// Returns [`AggregationError`] when a fragment is missing or a row cannot be
/// decoded.
pub fn assemble_task_detail(
    mut fragments: NamedFragments,
) -> Result<Option<TaskDetail>, AggregationError> {
    let task_rows = take(&mut fragments, "task")?;
    let tag_rows = take(&mut fragments, "tags")?;
    let attachment_rows = take(&mut fragments, "attachments")?;
    let subtask_rows = take(&mut fragments, "subtasks")?;

    let Some(task_row) = task_rows.into_iter().next() else {
        return Ok(None);
    };

    let task = decode_row::<StoredTaskRow>("task", task_row)?.into_task()?;
    let tags = tag_rows
        .iter()
        .map(project_tag)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(TaskDetail {
        task,
        tags,
        attachments: decode_rows("attachments", attachment_rows)?,
        subtasks: decode_rows("subtasks", subtask_rows)?,
    }))
}

/// Decodes template rows, parsing each stored payload.
///
/// # Errors
///
/// Returns [`AggregationError`] for a malformed row or payload.
pub fn decode_templates(rows: Vec<Record>) -> Result<Vec<TaskTemplate>, AggregationError> {
    rows.into_iter()
        .map(|row| {
            let stored: StoredTemplateRow = decode_row("templates", row)?;
            Ok(TaskTemplate {
                id_template: stored.id_template,
                name: stored.name,
                template_data: TemplatePayload::decode(&stored.template_data)?,
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecurrenceKind;
    use crate::infrastructure::{bind_fragments, routines};
    use rstest::rstest;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn task_row() -> Record {
        record(json!({
            "idTask": 17,
            "idAccount": 1,
            "idUser": 2,
            "title": "Renew passport",
            "description": "",
            "dueDate": "2026-09-01",
            "priority": 2,
            "status": 0,
            "recurrenceConfig": null,
            "estimatedHours": 1,
            "estimatedMinutes": 15,
            "dateCreated": "2026-01-05T10:00:00Z",
            "dateModified": "2026-01-05T10:00:00Z"
        }))
    }

    fn fragments(sets: Vec<Vec<Record>>) -> NamedFragments {
        bind_fragments(routines::TASK_GET_FRAGMENTS, sets).unwrap()
    }

    #[rstest]
    fn test_positional_fragments_map_to_fields() {
        let detail = assemble_task_detail(fragments(vec![
            vec![task_row()],
            vec![record(json!({"tag": "urgent"})), record(json!({"tag": "home"}))],
            vec![],
            vec![],
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(detail.task.id_task, TaskId::new(17));
        assert_eq!(detail.tags, vec!["urgent", "home"]);
        assert!(detail.attachments.is_empty());
        assert!(detail.subtasks.is_empty());
    }

    #[rstest]
    fn test_empty_task_fragment_is_not_found() {
        let detail = assemble_task_detail(fragments(vec![
            vec![],
            vec![record(json!({"tag": "urgent"}))],
            vec![record(json!({"unexpected": true}))],
            vec![],
        ]))
        .unwrap();

        assert!(detail.is_none());
    }

    #[rstest]
    fn test_missing_fragment_is_an_error() {
        let mut partial = NamedFragments::default();
        partial.insert("task", vec![task_row()]);
        partial.insert("tags", vec![]);

        let error = assemble_task_detail(partial).unwrap_err();

        assert!(matches!(error, AggregationError::MissingFragment("attachments")));
    }

    #[rstest]
    fn test_recurrence_text_is_decoded() {
        let mut row = task_row();
        row.insert(
            "recurrenceConfig".to_string(),
            json!(r#"{"type":"weekly","interval":2}"#),
        );

        let detail = assemble_task_detail(fragments(vec![vec![row], vec![], vec![], vec![]]))
            .unwrap()
            .unwrap();

        let recurrence = detail.task.recurrence_config.unwrap();
        assert_eq!(recurrence.kind, RecurrenceKind::Weekly);
        assert_eq!(recurrence.interval.get(), 2);
    }

    #[rstest]
    fn test_empty_recurrence_text_is_absent() {
        let mut row = task_row();
        row.insert("recurrenceConfig".to_string(), json!(""));

        let detail = assemble_task_detail(fragments(vec![vec![row], vec![], vec![], vec![]]))
            .unwrap()
            .unwrap();

        assert!(detail.task.recurrence_config.is_none());
    }

    #[rstest]
    fn test_invalid_recurrence_text_is_an_error() {
        let mut row = task_row();
        row.insert("recurrenceConfig".to_string(), json!("{not json"));

        let error =
            assemble_task_detail(fragments(vec![vec![row], vec![], vec![], vec![]])).unwrap_err();

        assert!(matches!(error, AggregationError::Recurrence(_)));
    }

    #[rstest]
    fn test_tag_row_without_tag_is_invalid() {
        let error = assemble_task_detail(fragments(vec![
            vec![task_row()],
            vec![record(json!({"name": "urgent"}))],
            vec![],
            vec![],
        ]))
        .unwrap_err();

        assert!(matches!(
            error,
            AggregationError::InvalidRow {
                fragment: "tags",
                ..
            }
        ));
    }

    #[rstest]
    fn test_subtasks_and_attachments_are_decoded() {
        let detail = assemble_task_detail(fragments(vec![
            vec![task_row()],
            vec![],
            vec![record(json!({
                "idAttachment": 3,
                "fileName": "scan.pdf",
                "fileSize": 2048,
                "fileType": "application/pdf",
                "filePath": "/files/scan.pdf",
                "dateCreated": "2026-01-06T09:00:00Z"
            }))],
            vec![record(json!({
                "idSubtask": 8,
                "title": "Take photo",
                "status": 2,
                "sortOrder": 0,
                "dateCreated": "2026-01-05T10:00:00Z"
            }))],
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(detail.attachments[0].file_name, "scan.pdf");
        assert!(detail.subtasks[0].status.is_completed());
    }

    #[rstest]
    fn test_decode_templates() {
        let templates = decode_templates(vec![record(json!({
            "idTemplate": 1,
            "name": "Weekly review",
            "templateData": r#"{"title":"Weekly review","priority":1,"tags":["planning"]}"#
        }))])
        .unwrap();

        assert_eq!(templates[0].name, "Weekly review");
        assert_eq!(templates[0].template_data.priority, Some(Priority::Medium));
    }

    #[rstest]
    fn test_decode_templates_rejects_bad_payload() {
        let error = decode_templates(vec![record(json!({
            "idTemplate": 1,
            "name": "Broken",
            "templateData": "[]"
        }))])
        .unwrap_err();

        assert!(matches!(error, AggregationError::Template(_)));
    }
}
