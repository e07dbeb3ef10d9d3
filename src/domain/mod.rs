//! Domain module for task management.
//!
//! This module contains the task aggregate, its recurrence configuration and
//! task templates.

pub mod recurrence;
pub mod task;
pub mod template;

pub use recurrence::{RecurrenceConfig, RecurrenceDecodeError, RecurrenceKind};
pub use task::{
    Attachment, Priority, Subtask, Task, TaskCreated, TaskDetail, TaskId, TaskStatus,
    TaskSummary, UnknownCode,
};
pub use template::{TaskTemplate, TemplateDecodeError, TemplatePayload};
