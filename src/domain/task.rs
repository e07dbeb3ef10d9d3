//! Task domain model.
//!
//! This module contains the task aggregate as it is read back from the data
//! layer: the task record itself plus the tags, attachments and subtasks that
//! belong to it. Priority and status travel as small integers on the wire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::recurrence::RecurrenceConfig;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Identifier assigned to a task by the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns `true` if the identifier is a valid, assigned identifier.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Error returned when a numeric code does not name a known enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} code: {code}")]
pub struct UnknownCode {
    kind: &'static str,
    code: u8,
}

// =============================================================================
// Enums
// =============================================================================

/// The priority level of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    /// Low priority (value: 0).
    Low,
    /// Medium priority (value: 1).
    #[default]
    Medium,
    /// High priority (value: 2).
    High,
}

impl Priority {
    /// Returns the numeric value of the priority.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            _ => Err(UnknownCode {
                kind: "priority",
                code,
            }),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.value()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(formatter, "Low"),
            Self::Medium => write!(formatter, "Medium"),
            Self::High => write!(formatter, "High"),
        }
    }
}

/// The status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskStatus {
    /// Task has not been started yet.
    #[default]
    Pending,
    /// Task is still being drafted.
    Draft,
    /// Task has been completed.
    Completed,
}

impl TaskStatus {
    /// Returns the numeric value of the status.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Draft => 1,
            Self::Completed => 2,
        }
    }

    /// Returns `true` if the task is completed.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Draft),
            2 => Ok(Self::Completed),
            _ => Err(UnknownCode {
                kind: "status",
                code,
            }),
        }
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.value()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(formatter, "Pending"),
            Self::Draft => write!(formatter, "Draft"),
            Self::Completed => write!(formatter, "Completed"),
        }
    }
}

// =============================================================================
// Task
// =============================================================================

/// A task record with its recurrence configuration already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id_task: TaskId,
    pub id_account: i64,
    pub id_user: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub recurrence_config: Option<RecurrenceConfig>,
    pub estimated_hours: Option<u16>,
    pub estimated_minutes: Option<u8>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// A subtask belonging to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id_subtask: i64,
    pub title: String,
    pub status: TaskStatus,
    pub sort_order: i32,
    pub date_created: DateTime<Utc>,
}

/// A file attached to a task. Read-only from this service's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id_attachment: i64,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub file_path: String,
    pub date_created: DateTime<Utc>,
}

/// The composite view returned by a task lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDetail {
    pub task: Task,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub subtasks: Vec<Subtask>,
}

/// Lightweight list row: counts instead of tag and subtask contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id_task: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub estimated_hours: Option<u16>,
    pub estimated_minutes: Option<u8>,
    pub tag_count: u32,
    pub subtask_count: u32,
    pub completed_subtask_count: u32,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// Result of a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub id_task: TaskId,
}

// =============================================================================
// Tests
// =============================================================================
